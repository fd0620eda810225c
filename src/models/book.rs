//! Book (catalog record) model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Catalog record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    /// Average review rating, absent until the book has a review
    pub rating: Option<f64>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
}

/// Update book request (fields left out stay unchanged)
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Author cannot be empty"))]
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
}

impl UpdateBook {
    /// Apply the present fields onto an existing record
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref author) = self.author {
            book.author = author.clone();
        }
        if self.publisher.is_some() {
            book.publisher = self.publisher.clone();
        }
        if self.publication_year.is_some() {
            book.publication_year = self.publication_year;
        }
        if self.isbn.is_some() {
            book.isbn = self.isbn.clone();
        }
        if self.genre.is_some() {
            book.genre = self.genre.clone();
        }
        if self.description.is_some() {
            book.description = self.description.clone();
        }
        if self.cover_image.is_some() {
            book.cover_image = self.cover_image.clone();
        }
    }
}
