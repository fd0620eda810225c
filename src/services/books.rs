//! Catalog service

use chrono::{Datelike, Utc};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook, UpdateBook},
    repository::Repository,
};

fn check_publication_year(year: Option<i32>) -> AppResult<()> {
    if let Some(year) = year {
        let latest = Utc::now().year() + 1;
        if !(0..=latest).contains(&year) {
            return Err(AppError::Validation(format!(
                "Publication year must be between 0 and {}",
                latest
            )));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
}

impl BooksService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn create(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        check_publication_year(book.publication_year)?;

        let book = self.repository.books.create(&book).await?;
        tracing::info!(book_id = book.id, "Book created");
        Ok(book)
    }

    pub async fn get(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn list(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    pub async fn update(&self, id: i32, update: UpdateBook) -> AppResult<Book> {
        update.validate()?;
        check_publication_year(update.publication_year)?;

        let mut book = self.repository.books.get_by_id(id).await?;
        update.apply_to(&mut book);
        self.repository.books.update(&book).await
    }

    /// Delete a book that is not currently on loan
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dune() -> CreateBook {
        CreateBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            publisher: Some("Chilton".to_string()),
            publication_year: Some(1965),
            isbn: None,
            genre: Some("Science fiction".to_string()),
            description: None,
            cover_image: None,
        }
    }

    #[tokio::test]
    async fn create_and_partially_update() {
        let service = BooksService::new(Repository::in_memory());
        let book = service.create(dune()).await.unwrap();
        assert_eq!(book.rating, None);

        let updated = service
            .update(
                book.id,
                UpdateBook {
                    isbn: Some("9780441013593".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Dune");
        assert_eq!(updated.isbn.as_deref(), Some("9780441013593"));
    }

    #[tokio::test]
    async fn rejects_missing_title_and_future_year() {
        let service = BooksService::new(Repository::in_memory());

        let mut untitled = dune();
        untitled.title = String::new();
        assert!(matches!(
            service.create(untitled).await,
            Err(AppError::Validation(_))
        ));

        let mut future = dune();
        future.publication_year = Some(Utc::now().year() + 5);
        assert!(matches!(
            service.create(future).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn delete_missing_book_is_not_found() {
        let service = BooksService::new(Repository::in_memory());
        assert!(matches!(service.delete(3).await, Err(AppError::NotFound(_))));
    }
}
