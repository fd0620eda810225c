//! Repository layer: storage contracts and their implementations

pub mod books;
pub mod loans;
pub mod members;
pub mod memory;
pub mod notifications;
pub mod reviews;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        book::{Book, CreateBook},
        loan::{Loan, NewLoan},
        member::{Member, NewMember},
        notification::{CreateNotification, Notification},
        review::{NewReview, Review},
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Insert a member. Conflict if the email is taken.
    async fn create(&self, member: &NewMember) -> AppResult<Member>;
    async fn get_by_id(&self, id: i32) -> AppResult<Member>;
    /// Case-insensitive lookup
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Member>>;
    async fn list(&self) -> AppResult<Vec<Member>>;
    /// Persist every field of `member` except the password hash
    async fn update(&self, member: &Member) -> AppResult<Member>;
    /// Delete a member and everything hanging off it. Conflict while the
    /// member holds an active loan, checked under the same lock as the delete.
    async fn delete(&self, id: i32) -> AppResult<()>;
    async fn count(&self) -> AppResult<i64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn create(&self, book: &CreateBook) -> AppResult<Book>;
    async fn get_by_id(&self, id: i32) -> AppResult<Book>;
    async fn list(&self) -> AppResult<Vec<Book>>;
    async fn update(&self, book: &Book) -> AppResult<Book>;
    async fn set_rating(&self, id: i32, rating: Option<f64>) -> AppResult<()>;
    /// Conflict while the book is on an active loan
    async fn delete(&self, id: i32) -> AppResult<()>;
    async fn count(&self) -> AppResult<i64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanRepository: Send + Sync {
    /// Insert an active loan. NotFound if the member or book is missing,
    /// Conflict if the member already holds an active loan for the book.
    async fn create(&self, loan: &NewLoan) -> AppResult<Loan>;
    async fn get_by_id(&self, id: i32) -> AppResult<Loan>;
    async fn list(&self) -> AppResult<Vec<Loan>>;
    async fn list_by_member(&self, member_id: i32) -> AppResult<Vec<Loan>>;
    async fn list_by_book(&self, book_id: i32) -> AppResult<Vec<Loan>>;
    async fn list_active(&self) -> AppResult<Vec<Loan>>;
    /// Loans with `start <= due_date < end`
    async fn list_due_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<Loan>>;
    /// Atomically move an active loan to returned. Conflict if it already is.
    async fn mark_returned(&self, id: i32, returned_at: DateTime<Utc>) -> AppResult<Loan>;
    /// Change the due date of an active loan. Conflict if it was returned.
    async fn update_due_date(&self, id: i32, due_date: DateTime<Utc>) -> AppResult<Loan>;
    async fn delete(&self, id: i32) -> AppResult<()>;
    async fn count(&self) -> AppResult<i64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &CreateNotification) -> AppResult<Notification>;
    async fn get_by_id(&self, id: i32) -> AppResult<Notification>;
    async fn list(&self) -> AppResult<Vec<Notification>>;
    async fn list_by_member(&self, member_id: i32) -> AppResult<Vec<Notification>>;
    async fn update(&self, notification: &Notification) -> AppResult<Notification>;
    async fn mark_read(&self, id: i32) -> AppResult<Notification>;
    async fn delete(&self, id: i32) -> AppResult<()>;
    async fn count_unread(&self, member_id: i32) -> AppResult<i64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Conflict if the member already reviewed the book
    async fn create(&self, review: &NewReview) -> AppResult<Review>;
    async fn get_by_id(&self, id: i32) -> AppResult<Review>;
    async fn list(&self) -> AppResult<Vec<Review>>;
    async fn list_by_book(&self, book_id: i32) -> AppResult<Vec<Review>>;
    async fn update(&self, review: &Review) -> AppResult<Review>;
    async fn delete(&self, id: i32) -> AppResult<()>;
}

/// Main repository struct holding one store per entity
#[derive(Clone)]
pub struct Repository {
    pub members: Arc<dyn MemberRepository>,
    pub books: Arc<dyn BookRepository>,
    pub loans: Arc<dyn LoanRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pool: Option<Pool<Postgres>>,
}

impl Repository {
    /// Create a Postgres-backed repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            members: Arc::new(members::MembersRepository::new(pool.clone())),
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            loans: Arc::new(loans::LoansRepository::new(pool.clone())),
            notifications: Arc::new(notifications::NotificationsRepository::new(pool.clone())),
            reviews: Arc::new(reviews::ReviewsRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create a repository backed by process memory
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            members: store.clone(),
            books: store.clone(),
            loans: store.clone(),
            notifications: store.clone(),
            reviews: store,
            pool: None,
        }
    }

    /// Assemble a repository from individual stores
    pub fn from_parts(
        members: Arc<dyn MemberRepository>,
        books: Arc<dyn BookRepository>,
        loans: Arc<dyn LoanRepository>,
        notifications: Arc<dyn NotificationRepository>,
        reviews: Arc<dyn ReviewRepository>,
    ) -> Self {
        Self {
            members,
            books,
            loans,
            notifications,
            reviews,
            pool: None,
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(ref pool) = self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}
