//! Notifications repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::notification::{CreateNotification, Notification},
};

use super::NotificationRepository;

#[derive(Clone)]
pub struct NotificationsRepository {
    pool: Pool<Postgres>,
}

impl NotificationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for NotificationsRepository {
    async fn create(&self, notification: &CreateNotification) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (member_id, title, message, category, is_read, created_at)
            VALUES ($1, $2, $3, $4, FALSE, NOW())
            RETURNING *
            "#,
        )
        .bind(notification.member_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.category)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_write(
                e,
                "Notification already exists",
                &format!("Member with id {} not found", notification.member_id),
            )
        })
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
    }

    async fn list(&self) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>("SELECT * FROM notifications ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_by_member(&self, member_id: i32) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE member_id = $1 ORDER BY id",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update(&self, notification: &Notification) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET title = $2, message = $3, category = $4, is_read = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(notification.id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.category)
        .bind(notification.is_read)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", notification.id)))
    }

    async fn mark_read(&self, id: i32) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }

    async fn count_unread(&self, member_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE member_id = $1 AND NOT is_read",
        )
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
