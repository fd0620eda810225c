//! Notification model (messages addressed to a member)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Category used for notices generated from overdue loans
pub const OVERDUE_CATEGORY: &str = "overdue";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i32,
    pub member_id: i32,
    pub title: String,
    pub message: String,
    pub category: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Create notification request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateNotification {
    pub member_id: i32,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    pub category: Option<String>,
}

/// Update notification request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateNotification {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Message cannot be empty"))]
    pub message: Option<String>,
    pub category: Option<String>,
    pub is_read: Option<bool>,
}

impl UpdateNotification {
    pub fn apply_to(&self, notification: &mut Notification) {
        if let Some(ref title) = self.title {
            notification.title = title.clone();
        }
        if let Some(ref message) = self.message {
            notification.message = message.clone();
        }
        if self.category.is_some() {
            notification.category = self.category.clone();
        }
        if let Some(is_read) = self.is_read {
            notification.is_read = is_read;
        }
    }
}

/// Unread notification count
#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub unread: i64,
}
