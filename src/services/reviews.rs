//! Book reviews and the derived book rating

use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppResult,
    models::review::{average_rating, CreateReview, NewReview, Review, UpdateReview},
    repository::Repository,
};

#[derive(Clone)]
pub struct ReviewsService {
    repository: Repository,
}

impl ReviewsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Recompute a book's average rating from its reviews
    async fn refresh_rating(&self, book_id: i32) -> AppResult<()> {
        let ratings: Vec<i16> = self
            .repository
            .reviews
            .list_by_book(book_id)
            .await?
            .iter()
            .map(|r| r.rating)
            .collect();
        self.repository
            .books
            .set_rating(book_id, average_rating(&ratings))
            .await
    }

    pub async fn create(&self, member_id: i32, request: CreateReview) -> AppResult<Review> {
        request.validate()?;
        self.repository.books.get_by_id(request.book_id).await?;

        let review = NewReview {
            member_id,
            book_id: request.book_id,
            rating: request.rating,
            comment: request.comment,
            created_at: Utc::now(),
        };

        let review = self.repository.reviews.create(&review).await?;
        self.refresh_rating(review.book_id).await?;
        tracing::info!(review_id = review.id, book_id = review.book_id, "Review created");
        Ok(review)
    }

    pub async fn get(&self, id: i32) -> AppResult<Review> {
        self.repository.reviews.get_by_id(id).await
    }

    pub async fn list(&self) -> AppResult<Vec<Review>> {
        self.repository.reviews.list().await
    }

    pub async fn list_by_book(&self, book_id: i32) -> AppResult<Vec<Review>> {
        self.repository.books.get_by_id(book_id).await?;
        self.repository.reviews.list_by_book(book_id).await
    }

    pub async fn update(&self, id: i32, update: UpdateReview) -> AppResult<Review> {
        update.validate()?;
        let mut review = self.repository.reviews.get_by_id(id).await?;

        if let Some(rating) = update.rating {
            review.rating = rating;
        }
        if update.comment.is_some() {
            review.comment = update.comment;
        }

        let review = self.repository.reviews.update(&review).await?;
        self.refresh_rating(review.book_id).await?;
        Ok(review)
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let review = self.repository.reviews.get_by_id(id).await?;
        self.repository.reviews.delete(id).await?;
        self.refresh_rating(review.book_id).await
    }
}
