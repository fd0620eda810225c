//! In-process repository used by tests and the `memory` storage backend.
//!
//! Each entity table sits behind its own lock. Operations that touch several
//! tables acquire them in the order members, books, loans, reviews,
//! notifications.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook},
        loan::{Loan, NewLoan},
        member::{Member, NewMember},
        notification::{CreateNotification, Notification},
        review::{NewReview, Review},
    },
};

use super::{
    books::active_loans_for_book,
    loans::{already_returned, ACTIVE_LOAN_EXISTS},
    members::active_loans_for_member,
    reviews::REVIEW_EXISTS,
    BookRepository, LoanRepository, MemberRepository, NotificationRepository, ReviewRepository,
};

/// Rows keyed by ID with a monotonically increasing sequence
struct Table<T> {
    rows: BTreeMap<i32, T>,
    next_id: i32,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T: Clone> Table<T> {
    fn insert_with(&mut self, build: impl FnOnce(i32) -> T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(id, row.clone());
        row
    }

    fn values(&self) -> Vec<T> {
        self.rows.values().cloned().collect()
    }

    fn filtered(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows.values().filter(|row| keep(row)).cloned().collect()
    }
}

fn member_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Member with id {} not found", id))
}

fn book_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", id))
}

fn loan_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Loan with id {} not found", id))
}

fn notification_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Notification {} not found", id))
}

fn review_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Review {} not found", id))
}

#[derive(Default)]
pub struct MemoryStore {
    members: RwLock<Table<Member>>,
    books: RwLock<Table<Book>>,
    loans: RwLock<Table<Loan>>,
    reviews: RwLock<Table<Review>>,
    notifications: RwLock<Table<Notification>>,
}

#[async_trait]
impl MemberRepository for MemoryStore {
    async fn create(&self, member: &NewMember) -> AppResult<Member> {
        let mut members = self.members.write().await;
        let taken = members
            .rows
            .values()
            .any(|m| m.email == member.email);
        if taken {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        Ok(members.insert_with(|id| Member {
            id,
            name: member.name.clone(),
            email: member.email.clone(),
            password: member.password_hash.clone(),
            phone: member.phone.clone(),
            address: member.address.clone(),
            registration_date: member.registration_date,
            membership_type: member.membership_type,
        }))
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Member> {
        self.members
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| member_not_found(id))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Member>> {
        Ok(self
            .members
            .read()
            .await
            .rows
            .values()
            .find(|m| m.email == email)
            .cloned())
    }

    async fn list(&self) -> AppResult<Vec<Member>> {
        Ok(self.members.read().await.values())
    }

    async fn update(&self, member: &Member) -> AppResult<Member> {
        let mut members = self.members.write().await;
        let taken = members
            .rows
            .values()
            .any(|m| m.id != member.id && m.email == member.email);
        if taken {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let stored = members
            .rows
            .get_mut(&member.id)
            .ok_or_else(|| member_not_found(member.id))?;
        stored.name = member.name.clone();
        stored.email = member.email.clone();
        stored.phone = member.phone.clone();
        stored.address = member.address.clone();
        stored.membership_type = member.membership_type;
        Ok(stored.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut members = self.members.write().await;
        let mut loans = self.loans.write().await;
        let mut reviews = self.reviews.write().await;
        let mut notifications = self.notifications.write().await;

        if !members.rows.contains_key(&id) {
            return Err(member_not_found(id));
        }
        if loans.rows.values().any(|l| !l.returned && l.member_id == id) {
            return Err(active_loans_for_member(id));
        }

        members.rows.remove(&id);
        loans.rows.retain(|_, l| l.member_id != id);
        reviews.rows.retain(|_, r| r.member_id != id);
        notifications.rows.retain(|_, n| n.member_id != id);
        Ok(())
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.members.read().await.rows.len() as i64)
    }
}

#[async_trait]
impl BookRepository for MemoryStore {
    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        Ok(self.books.write().await.insert_with(|id| Book {
            id,
            title: book.title.clone(),
            author: book.author.clone(),
            publisher: book.publisher.clone(),
            publication_year: book.publication_year,
            isbn: book.isbn.clone(),
            genre: book.genre.clone(),
            description: book.description.clone(),
            cover_image: book.cover_image.clone(),
            rating: None,
        }))
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        self.books
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| book_not_found(id))
    }

    async fn list(&self) -> AppResult<Vec<Book>> {
        Ok(self.books.read().await.values())
    }

    async fn update(&self, book: &Book) -> AppResult<Book> {
        let mut books = self.books.write().await;
        let stored = books
            .rows
            .get_mut(&book.id)
            .ok_or_else(|| book_not_found(book.id))?;
        let rating = stored.rating;
        *stored = Book {
            rating,
            ..book.clone()
        };
        Ok(stored.clone())
    }

    async fn set_rating(&self, id: i32, rating: Option<f64>) -> AppResult<()> {
        let mut books = self.books.write().await;
        let stored = books.rows.get_mut(&id).ok_or_else(|| book_not_found(id))?;
        stored.rating = rating;
        Ok(())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut books = self.books.write().await;
        let mut loans = self.loans.write().await;
        let mut reviews = self.reviews.write().await;

        if !books.rows.contains_key(&id) {
            return Err(book_not_found(id));
        }
        if loans.rows.values().any(|l| !l.returned && l.book_id == id) {
            return Err(active_loans_for_book(id));
        }

        books.rows.remove(&id);
        loans.rows.retain(|_, l| l.book_id != id);
        reviews.rows.retain(|_, r| r.book_id != id);
        Ok(())
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.books.read().await.rows.len() as i64)
    }
}

#[async_trait]
impl LoanRepository for MemoryStore {
    async fn create(&self, loan: &NewLoan) -> AppResult<Loan> {
        let members = self.members.read().await;
        let books = self.books.read().await;
        let mut loans = self.loans.write().await;

        if !members.rows.contains_key(&loan.member_id) {
            return Err(member_not_found(loan.member_id));
        }
        if !books.rows.contains_key(&loan.book_id) {
            return Err(book_not_found(loan.book_id));
        }

        let active = loans
            .rows
            .values()
            .any(|l| !l.returned && l.member_id == loan.member_id && l.book_id == loan.book_id);
        if active {
            return Err(AppError::Conflict(ACTIVE_LOAN_EXISTS.to_string()));
        }

        Ok(loans.insert_with(|id| Loan {
            id,
            member_id: loan.member_id,
            book_id: loan.book_id,
            borrow_date: loan.borrow_date,
            due_date: loan.due_date,
            return_date: None,
            returned: false,
        }))
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        self.loans
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| loan_not_found(id))
    }

    async fn list(&self) -> AppResult<Vec<Loan>> {
        Ok(self.loans.read().await.values())
    }

    async fn list_by_member(&self, member_id: i32) -> AppResult<Vec<Loan>> {
        Ok(self.loans.read().await.filtered(|l| l.member_id == member_id))
    }

    async fn list_by_book(&self, book_id: i32) -> AppResult<Vec<Loan>> {
        Ok(self.loans.read().await.filtered(|l| l.book_id == book_id))
    }

    async fn list_active(&self) -> AppResult<Vec<Loan>> {
        Ok(self.loans.read().await.filtered(|l| !l.returned))
    }

    async fn list_due_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        Ok(self
            .loans
            .read()
            .await
            .filtered(|l| l.due_date >= start && l.due_date < end))
    }

    async fn mark_returned(&self, id: i32, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        let mut loans = self.loans.write().await;
        let loan = loans.rows.get_mut(&id).ok_or_else(|| loan_not_found(id))?;
        if loan.returned {
            return Err(already_returned(id));
        }
        loan.returned = true;
        loan.return_date = Some(returned_at);
        Ok(loan.clone())
    }

    async fn update_due_date(&self, id: i32, due_date: DateTime<Utc>) -> AppResult<Loan> {
        let mut loans = self.loans.write().await;
        let loan = loans.rows.get_mut(&id).ok_or_else(|| loan_not_found(id))?;
        if loan.returned {
            return Err(already_returned(id));
        }
        loan.due_date = due_date;
        Ok(loan.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        match self.loans.write().await.rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(loan_not_found(id)),
        }
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.loans.read().await.rows.len() as i64)
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn create(&self, notification: &CreateNotification) -> AppResult<Notification> {
        let members = self.members.read().await;
        let mut notifications = self.notifications.write().await;

        if !members.rows.contains_key(&notification.member_id) {
            return Err(member_not_found(notification.member_id));
        }

        Ok(notifications.insert_with(|id| Notification {
            id,
            member_id: notification.member_id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            category: notification.category.clone(),
            is_read: false,
            created_at: Utc::now(),
        }))
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Notification> {
        self.notifications
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| notification_not_found(id))
    }

    async fn list(&self) -> AppResult<Vec<Notification>> {
        Ok(self.notifications.read().await.values())
    }

    async fn list_by_member(&self, member_id: i32) -> AppResult<Vec<Notification>> {
        Ok(self
            .notifications
            .read()
            .await
            .filtered(|n| n.member_id == member_id))
    }

    async fn update(&self, notification: &Notification) -> AppResult<Notification> {
        let mut notifications = self.notifications.write().await;
        let stored = notifications
            .rows
            .get_mut(&notification.id)
            .ok_or_else(|| notification_not_found(notification.id))?;
        stored.title = notification.title.clone();
        stored.message = notification.message.clone();
        stored.category = notification.category.clone();
        stored.is_read = notification.is_read;
        Ok(stored.clone())
    }

    async fn mark_read(&self, id: i32) -> AppResult<Notification> {
        let mut notifications = self.notifications.write().await;
        let stored = notifications
            .rows
            .get_mut(&id)
            .ok_or_else(|| notification_not_found(id))?;
        stored.is_read = true;
        Ok(stored.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        match self.notifications.write().await.rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(notification_not_found(id)),
        }
    }

    async fn count_unread(&self, member_id: i32) -> AppResult<i64> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .rows
            .values()
            .filter(|n| n.member_id == member_id && !n.is_read)
            .count() as i64)
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn create(&self, review: &NewReview) -> AppResult<Review> {
        let members = self.members.read().await;
        let books = self.books.read().await;
        let mut reviews = self.reviews.write().await;

        if !members.rows.contains_key(&review.member_id) {
            return Err(member_not_found(review.member_id));
        }
        if !books.rows.contains_key(&review.book_id) {
            return Err(book_not_found(review.book_id));
        }
        let exists = reviews
            .rows
            .values()
            .any(|r| r.member_id == review.member_id && r.book_id == review.book_id);
        if exists {
            return Err(AppError::Conflict(REVIEW_EXISTS.to_string()));
        }

        Ok(reviews.insert_with(|id| Review {
            id,
            member_id: review.member_id,
            book_id: review.book_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: review.created_at,
        }))
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Review> {
        self.reviews
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| review_not_found(id))
    }

    async fn list(&self) -> AppResult<Vec<Review>> {
        Ok(self.reviews.read().await.values())
    }

    async fn list_by_book(&self, book_id: i32) -> AppResult<Vec<Review>> {
        Ok(self.reviews.read().await.filtered(|r| r.book_id == book_id))
    }

    async fn update(&self, review: &Review) -> AppResult<Review> {
        let mut reviews = self.reviews.write().await;
        let stored = reviews
            .rows
            .get_mut(&review.id)
            .ok_or_else(|| review_not_found(review.id))?;
        stored.rating = review.rating;
        stored.comment = review.comment.clone();
        Ok(stored.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        match self.reviews.write().await.rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(review_not_found(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::MembershipType;
    use chrono::Duration;
    use std::sync::Arc;

    fn new_member(email: &str) -> NewMember {
        NewMember {
            name: "Alice".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            phone: None,
            address: None,
            registration_date: Utc::now(),
            membership_type: MembershipType::Regular,
        }
    }

    fn new_book() -> CreateBook {
        CreateBook {
            title: "Go Programming".to_string(),
            author: "Alice".to_string(),
            publisher: None,
            publication_year: Some(2024),
            isbn: None,
            genre: None,
            description: None,
            cover_image: None,
        }
    }

    fn new_loan(member_id: i32, book_id: i32) -> NewLoan {
        let now = Utc::now();
        NewLoan {
            member_id,
            book_id,
            borrow_date: now,
            due_date: now + Duration::days(14),
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::default();
        MemberRepository::create(&store, &new_member("alice@example.com"))
            .await
            .unwrap();
        BookRepository::create(&store, &new_book()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn ids_are_sequential() {
        let store = seeded().await;
        let second = MemberRepository::create(&store, &new_member("bob@example.com"))
            .await
            .unwrap();
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn emails_are_unique() {
        let store = seeded().await;
        let found = store.find_by_email("alice@example.com").await.unwrap();
        assert_eq!(found.map(|m| m.id), Some(1));

        let dup = MemberRepository::create(&store, &new_member("alice@example.com")).await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn emails_compare_exactly_once_normalized() {
        let store = seeded().await;
        MemberRepository::create(&store, &new_member("élodie@example.com"))
            .await
            .unwrap();

        let found = store.find_by_email("élodie@example.com").await.unwrap();
        assert_eq!(found.map(|m| m.id), Some(2));
        assert!(store.find_by_email("Élodie@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn loan_requires_existing_member_and_book() {
        let store = seeded().await;
        let missing_member = LoanRepository::create(&store, &new_loan(9, 1)).await;
        assert!(matches!(missing_member, Err(AppError::NotFound(_))));

        let missing_book = LoanRepository::create(&store, &new_loan(1, 9)).await;
        assert!(matches!(missing_book, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn one_active_loan_per_member_and_book() {
        let store = seeded().await;
        let first = LoanRepository::create(&store, &new_loan(1, 1)).await.unwrap();

        let second = LoanRepository::create(&store, &new_loan(1, 1)).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        store.mark_returned(first.id, Utc::now()).await.unwrap();
        let again = LoanRepository::create(&store, &new_loan(1, 1)).await.unwrap();
        assert_eq!(again.id, 2);
    }

    #[tokio::test]
    async fn concurrent_returns_only_one_wins() {
        let store = Arc::new(seeded().await);
        let loan_id = LoanRepository::create(store.as_ref(), &new_loan(1, 1))
            .await
            .unwrap()
            .id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.mark_returned(loan_id, Utc::now()).await })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn due_range_is_half_open() {
        let store = seeded().await;
        let loan = LoanRepository::create(&store, &new_loan(1, 1)).await.unwrap();

        let hits = store
            .list_due_between(loan.due_date, loan.due_date + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let misses = store
            .list_due_between(loan.due_date - Duration::days(1), loan.due_date)
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn deleting_member_cascades() {
        let store = seeded().await;
        let loan = LoanRepository::create(&store, &new_loan(1, 1)).await.unwrap();
        store.mark_returned(loan.id, Utc::now()).await.unwrap();
        NotificationRepository::create(
            &store,
            &CreateNotification {
                member_id: 1,
                title: "Hello".to_string(),
                message: "Welcome".to_string(),
                category: None,
            },
        )
        .await
        .unwrap();

        MemberRepository::delete(&store, 1).await.unwrap();
        assert!(LoanRepository::list(&store).await.unwrap().is_empty());
        assert!(NotificationRepository::list(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn member_with_active_loan_cannot_be_deleted() {
        let store = seeded().await;
        LoanRepository::create(&store, &new_loan(1, 1)).await.unwrap();

        let result = MemberRepository::delete(&store, 1).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(MemberRepository::get_by_id(&store, 1).await.is_ok());
        assert_eq!(LoanRepository::count(&store).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn book_with_active_loan_cannot_be_deleted() {
        let store = seeded().await;
        LoanRepository::create(&store, &new_loan(1, 1)).await.unwrap();

        let result = BookRepository::delete(&store, 1).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(BookRepository::get_by_id(&store, 1).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn delete_racing_a_borrow_never_drops_an_active_loan() {
        for _ in 0..64 {
            let store = Arc::new(seeded().await);

            let borrower = {
                let store = store.clone();
                tokio::spawn(async move { LoanRepository::create(store.as_ref(), &new_loan(1, 1)).await })
            };
            let deleter = {
                let store = store.clone();
                tokio::spawn(async move { MemberRepository::delete(store.as_ref(), 1).await })
            };

            let borrowed = borrower.await.unwrap();
            let deleted = deleter.await.unwrap();
            let remaining = LoanRepository::count(store.as_ref()).await.unwrap();

            match deleted {
                Ok(()) => {
                    assert!(matches!(borrowed, Err(AppError::NotFound(_))));
                    assert_eq!(remaining, 0);
                }
                Err(AppError::Conflict(_)) => {
                    assert!(borrowed.is_ok());
                    assert_eq!(remaining, 1);
                }
                Err(e) => panic!("unexpected delete error: {e:?}"),
            }
        }
    }
}
