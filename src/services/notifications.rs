//! Member notifications

use validator::Validate;

use crate::{
    error::AppResult,
    models::notification::{CreateNotification, Notification, UpdateNotification},
    repository::Repository,
};

#[derive(Clone)]
pub struct NotificationsService {
    repository: Repository,
}

impl NotificationsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn create(&self, notification: CreateNotification) -> AppResult<Notification> {
        notification.validate()?;
        let notification = self.repository.notifications.create(&notification).await?;
        tracing::debug!(
            notification_id = notification.id,
            member_id = notification.member_id,
            "Notification created"
        );
        Ok(notification)
    }

    pub async fn get(&self, id: i32) -> AppResult<Notification> {
        self.repository.notifications.get_by_id(id).await
    }

    pub async fn list_for_member(&self, member_id: i32) -> AppResult<Vec<Notification>> {
        self.repository.notifications.list_by_member(member_id).await
    }

    pub async fn update(&self, id: i32, update: UpdateNotification) -> AppResult<Notification> {
        update.validate()?;
        let mut notification = self.repository.notifications.get_by_id(id).await?;
        update.apply_to(&mut notification);
        self.repository.notifications.update(&notification).await
    }

    pub async fn mark_read(&self, id: i32) -> AppResult<Notification> {
        self.repository.notifications.mark_read(id).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.notifications.delete(id).await
    }

    pub async fn unread_count(&self, member_id: i32) -> AppResult<i64> {
        self.repository.notifications.count_unread(member_id).await
    }
}
