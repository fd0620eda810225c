//! Business logic services

pub mod auth;
pub mod books;
pub mod loans;
pub mod members;
pub mod notifications;
pub mod reports;
pub mod reviews;
pub mod tokens;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub tokens: tokens::TokenService,
    pub members: members::MembersService,
    pub books: books::BooksService,
    pub loans: loans::LoansService,
    pub notifications: notifications::NotificationsService,
    pub reviews: reviews::ReviewsService,
    pub reports: reports::ReportsService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let tokens = tokens::TokenService::new(&config.auth);
        let loans = loans::LoansService::new(repository.clone(), config.loans.period_days);

        Self {
            auth: auth::AuthService::new(repository.clone(), tokens.clone()),
            tokens,
            members: members::MembersService::new(repository.clone()),
            books: books::BooksService::new(repository.clone()),
            reports: reports::ReportsService::new(repository.clone(), loans.clone()),
            loans,
            notifications: notifications::NotificationsService::new(repository.clone()),
            reviews: reviews::ReviewsService::new(repository.clone()),
            repository,
        }
    }

    /// Check that the backing store is reachable
    pub async fn ready(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
