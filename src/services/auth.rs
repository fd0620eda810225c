//! Registration, credential checks and login

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::member::{is_valid_email, normalize_email, Member, NewMember, RegisterMember},
    repository::Repository,
};

use super::tokens::{IssuedToken, TokenService};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Verified against when the email is unknown, so that both login failures
/// cost one argon2 verification.
static DUMMY_HASH: Lazy<String> =
    Lazy::new(|| hash_password("not-a-real-password").unwrap_or_default());

/// Hash a password using Argon2 with a random salt
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a candidate password against a stored PHC hash
pub fn verify_password(stored_hash: &str, candidate: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(repository: Repository, tokens: TokenService) -> Self {
        Self { repository, tokens }
    }

    /// Register a new member
    pub async fn register(&self, request: RegisterMember) -> AppResult<Member> {
        request.validate()?;

        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }

        let email = normalize_email(&request.email);
        if email.is_empty() {
            return Err(AppError::Validation("Email is required".to_string()));
        }
        if !is_valid_email(&email) {
            return Err(AppError::Validation("Invalid email format".to_string()));
        }

        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let member = NewMember {
            name: name.to_string(),
            email,
            password_hash: hash_password(&request.password)?,
            phone: request.phone,
            address: request.address,
            registration_date: Utc::now(),
            membership_type: request.membership_type.unwrap_or_default(),
        };

        // The store re-checks uniqueness for concurrent registrations
        let member = self.repository.members.create(&member).await?;
        tracing::info!(member_id = member.id, "Member registered");
        Ok(member)
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Member>> {
        self.repository
            .members
            .find_by_email(&normalize_email(email))
            .await
    }

    /// Authenticate by email and password and issue a session token
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(IssuedToken, Member)> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let member = match self.find_by_email(email).await? {
            Some(member) if verify_password(&member.password, password) => member,
            Some(_) => {
                return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
            }
            None => {
                verify_password(&DUMMY_HASH, password);
                return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
            }
        };

        let token = self.tokens.issue(member.id)?;
        tracing::info!(member_id = member.id, "Member logged in");
        Ok((token, member))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::MembershipType;
    use chrono::Duration;

    fn service() -> AuthService {
        AuthService::new(
            Repository::in_memory(),
            TokenService::with_ttl("test-secret", Duration::hours(1)),
        )
    }

    fn alice() -> RegisterMember {
        RegisterMember {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "Secret123".to_string(),
            phone: None,
            address: None,
            membership_type: None,
        }
    }

    #[test]
    fn hashing_is_salted_and_verifiable() {
        let first = hash_password("Secret123").unwrap();
        let second = hash_password("Secret123").unwrap();
        assert_ne!(first, second);
        assert_ne!(first, "Secret123");
        assert!(verify_password(&first, "Secret123"));
        assert!(!verify_password(&first, "secret123"));
        assert!(!verify_password("not a phc string", "Secret123"));
    }

    #[tokio::test]
    async fn register_stores_hash_not_password() {
        let auth = service();
        let member = auth.register(alice()).await.unwrap();
        assert_eq!(member.id, 1);
        assert_eq!(member.membership_type, MembershipType::Regular);
        assert_ne!(member.password, "Secret123");
        assert!(verify_password(&member.password, "Secret123"));
    }

    #[tokio::test]
    async fn register_normalizes_email_and_rejects_duplicates() {
        let auth = service();
        let mut request = alice();
        request.email = "  Alice@Example.COM ".to_string();
        let member = auth.register(request).await.unwrap();
        assert_eq!(member.email, "alice@example.com");

        let err = auth.register(alice()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let auth = service();

        let mut blank_name = alice();
        blank_name.name = "   ".to_string();
        assert!(matches!(
            auth.register(blank_name).await,
            Err(AppError::Validation(_))
        ));

        let mut bad_email = alice();
        bad_email.email = "alice@example".to_string();
        assert!(matches!(
            auth.register(bad_email).await,
            Err(AppError::Validation(_))
        ));

        let mut no_password = alice();
        no_password.password = String::new();
        assert!(matches!(
            auth.register(no_password).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let auth = service();
        auth.register(alice()).await.unwrap();

        let wrong_password = auth.login("alice@example.com", "nope").await.unwrap_err();
        let unknown_email = auth.login("bob@example.com", "Secret123").await.unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn login_issues_token_for_member() {
        let auth = service();
        let registered = auth.register(alice()).await.unwrap();

        let (issued, member) = auth.login("ALICE@example.com", "Secret123").await.unwrap();
        assert_eq!(member.id, registered.id);
        assert_eq!(auth.tokens.verify(&issued.token).unwrap(), registered.id);
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let auth = service();
        assert!(matches!(
            auth.login("", "Secret123").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            auth.login("alice@example.com", "").await,
            Err(AppError::Validation(_))
        ));
    }
}
