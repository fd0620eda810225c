//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, auth, books, health, loans, members, notifications, reviews};

/// Registers the `bearer_auth` scheme referenced by guarded paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library API",
        version = "1.0.0",
        description = "Library management REST API: members, books, loans, notifications and reviews"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        // Members
        members::list_members,
        members::get_member,
        members::update_member,
        members::delete_member,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Loans
        loans::list_loans,
        loans::create_loan,
        loans::get_loan,
        loans::update_loan,
        loans::return_loan,
        loans::delete_loan,
        loans::member_loans,
        loans::book_loans,
        loans::my_loans,
        // Notifications
        notifications::list_notifications,
        notifications::create_notification,
        notifications::get_notification,
        notifications::update_notification,
        notifications::delete_notification,
        notifications::mark_read,
        notifications::unread_count,
        // Reviews
        reviews::list_reviews,
        reviews::get_review,
        reviews::list_book_reviews,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review,
        // Admin
        admin::dashboard,
        admin::loan_report,
        admin::overdue_notices,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            // Members
            crate::models::member::Member,
            crate::models::member::MembershipType,
            crate::models::member::RegisterMember,
            crate::models::member::UpdateMember,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanView,
            crate::models::loan::CreateLoan,
            crate::models::loan::UpdateLoan,
            // Notifications
            crate::models::notification::Notification,
            crate::models::notification::CreateNotification,
            crate::models::notification::UpdateNotification,
            crate::models::notification::UnreadCount,
            // Reviews
            crate::models::review::Review,
            crate::models::review::CreateReview,
            crate::models::review::UpdateReview,
            // Admin
            crate::models::report::DashboardData,
            crate::models::report::LoanReport,
            crate::models::report::OverdueNotices,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and login"),
        (name = "members", description = "Member directory"),
        (name = "books", description = "Catalog"),
        (name = "loans", description = "Loan ledger"),
        (name = "notifications", description = "Member notifications"),
        (name = "reviews", description = "Book reviews"),
        (name = "admin", description = "Dashboard and reports")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
