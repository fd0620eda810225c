//! Loans repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, NewLoan},
};

use super::LoanRepository;

pub(crate) fn already_returned(id: i32) -> AppError {
    AppError::Conflict(format!("Loan with id {} already returned", id))
}

pub(crate) const ACTIVE_LOAN_EXISTS: &str = "Member already has an active loan for this book";

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Explain why a conditional update on an active loan touched no row
    async fn not_active(&self, id: i32) -> AppError {
        match self.get_by_id(id).await {
            Ok(_) => already_returned(id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl LoanRepository for LoansRepository {
    async fn create(&self, loan: &NewLoan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        // Lock both referenced rows so they cannot vanish before the insert
        let member_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM members WHERE id = $1 FOR SHARE)",
        )
        .bind(loan.member_id)
        .fetch_one(&mut *tx)
        .await?;

        if !member_exists {
            return Err(AppError::NotFound(format!(
                "Member with id {} not found",
                loan.member_id
            )));
        }

        let book_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE id = $1 FOR SHARE)",
        )
        .bind(loan.book_id)
        .fetch_one(&mut *tx)
        .await?;

        if !book_exists {
            return Err(AppError::NotFound(format!(
                "Book with id {} not found",
                loan.book_id
            )));
        }

        // The partial unique index rejects a second active loan for the pair
        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (member_id, book_id, borrow_date, due_date, returned)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING *
            "#,
        )
        .bind(loan.member_id)
        .bind(loan.book_id)
        .bind(loan.borrow_date)
        .bind(loan.due_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::from_write(
                e,
                ACTIVE_LOAN_EXISTS,
                "Member or book not found",
            )
        })?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn list(&self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>("SELECT * FROM loans ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    async fn list_by_member(&self, member_id: i32) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE member_id = $1 ORDER BY id",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn list_by_book(&self, book_id: i32) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE book_id = $1 ORDER BY id",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn list_active(&self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE NOT returned ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn list_due_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE due_date >= $1 AND due_date < $2 ORDER BY id",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn mark_returned(&self, id: i32, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET returned = TRUE, return_date = $2
            WHERE id = $1 AND NOT returned
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(returned_at)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(loan) => Ok(loan),
            None => Err(self.not_active(id).await),
        }
    }

    async fn update_due_date(&self, id: i32, due_date: DateTime<Utc>) -> AppResult<Loan> {
        let updated = sqlx::query_as::<_, Loan>(
            "UPDATE loans SET due_date = $2 WHERE id = $1 AND NOT returned RETURNING *",
        )
        .bind(id)
        .bind(due_date)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(loan) => Ok(loan),
            None => Err(self.not_active(id).await),
        }
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }
        Ok(())
    }

    async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
