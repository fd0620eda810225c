//! Notification endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::notification::{CreateNotification, Notification, UnreadCount, UpdateNotification},
    AppState,
};

use super::AuthenticatedMember;

/// Notifications of the authenticated member
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's notifications", body = Vec<Notification>)
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    caller: AuthenticatedMember,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = state
        .services
        .notifications
        .list_for_member(caller.member_id)
        .await?;
    Ok(Json(notifications))
}

/// Send a notification to a member
#[utoipa::path(
    post,
    path = "/notifications",
    tag = "notifications",
    security(("bearer_auth" = [])),
    request_body = CreateNotification,
    responses(
        (status = 201, description = "Notification created", body = Notification),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_notification(
    State(state): State<AppState>,
    Json(request): Json<CreateNotification>,
) -> AppResult<(StatusCode, Json<Notification>)> {
    let notification = state.services.notifications.create(request).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

#[utoipa::path(
    get,
    path = "/notifications/{id}",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification", body = Notification),
        (status = 404, description = "Notification not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Notification>> {
    let notification = state.services.notifications.get(id).await?;
    Ok(Json(notification))
}

#[utoipa::path(
    put,
    path = "/notifications/{id}",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Notification ID")
    ),
    request_body = UpdateNotification,
    responses(
        (status = 200, description = "Notification updated", body = Notification),
        (status = 404, description = "Notification not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_notification(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(update): Json<UpdateNotification>,
) -> AppResult<Json<Notification>> {
    let notification = state.services.notifications.update(id, update).await?;
    Ok(Json(notification))
}

#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Notification ID")
    ),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.notifications.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark a notification as read
#[utoipa::path(
    put,
    path = "/notifications/{id}/read",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked as read", body = Notification),
        (status = 404, description = "Notification not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Notification>> {
    let notification = state.services.notifications.mark_read(id).await?;
    Ok(Json(notification))
}

/// Unread notification count of the authenticated member
#[utoipa::path(
    get,
    path = "/notifications/unread/count",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Unread count", body = UnreadCount)
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    caller: AuthenticatedMember,
) -> AppResult<Json<UnreadCount>> {
    let unread = state
        .services
        .notifications
        .unread_count(caller.member_id)
        .await?;
    Ok(Json(UnreadCount { unread }))
}
