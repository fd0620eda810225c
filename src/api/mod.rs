//! API handlers for the library REST endpoints

pub mod admin;
pub mod auth;
pub mod books;
pub mod health;
pub mod loans;
pub mod members;
pub mod notifications;
pub mod openapi;
pub mod reviews;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, AppState};

/// Identity of the caller, placed in request extensions by [`access_guard`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedMember {
    pub member_id: i32,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedMember
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedMember>()
            .copied()
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))
    }
}

/// Middleware that requires a valid bearer token on the request
pub async fn access_guard(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or_else(|| {
        AppError::Authentication("Missing or malformed authorization header".to_string())
    })?;

    let member_id = state.services.tokens.verify(bearer.token())?;
    request
        .extensions_mut()
        .insert(AuthenticatedMember { member_id });

    Ok(next.run(request).await)
}

/// Routes reachable without a token
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/books", get(books::list_books))
        .route("/books/:id", get(books::get_book))
        .route("/books/:id/reviews", get(reviews::list_book_reviews))
        .route("/reviews", get(reviews::list_reviews))
        .route("/reviews/:id", get(reviews::get_review))
}

/// Routes behind the access guard
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Current member
        .route("/me", get(auth::me))
        .route("/me/loans", get(loans::my_loans))
        // Members
        .route("/members", get(members::list_members))
        .route(
            "/members/:id",
            get(members::get_member)
                .put(members::update_member)
                .delete(members::delete_member),
        )
        .route("/members/:id/loans", get(loans::member_loans))
        // Books
        .route("/books", post(books::create_book))
        .route("/books/:id", put(books::update_book).delete(books::delete_book))
        .route("/books/:id/loans", get(loans::book_loans))
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::create_loan))
        .route(
            "/loans/:id",
            get(loans::get_loan)
                .put(loans::update_loan)
                .delete(loans::delete_loan),
        )
        .route("/loans/:id/return", post(loans::return_loan))
        // Notifications
        .route(
            "/notifications",
            get(notifications::list_notifications).post(notifications::create_notification),
        )
        .route(
            "/notifications/unread/count",
            get(notifications::unread_count),
        )
        .route(
            "/notifications/:id",
            get(notifications::get_notification)
                .put(notifications::update_notification)
                .delete(notifications::delete_notification),
        )
        .route("/notifications/:id/read", put(notifications::mark_read))
        // Reviews
        .route("/reviews", post(reviews::create_review))
        .route(
            "/reviews/:id",
            put(reviews::update_review).delete(reviews::delete_review),
        )
        // Admin
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/reports", get(admin::loan_report))
        .route("/admin/overdue-notices", post(admin::overdue_notices))
        .route_layer(middleware::from_fn_with_state(state, access_guard))
}

/// Build the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = public_routes()
        .merge(protected_routes(state.clone()))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
