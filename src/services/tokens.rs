//! Bearer token issuing and verification (HS256 JWT)

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AuthConfig, MAX_TOKEN_TTL_HOURS},
    error::{AppError, AppResult},
};

/// JWT claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Member ID
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    /// Lifetimes above the accepted maximum are clamped to it
    pub fn new(config: &AuthConfig) -> Self {
        let hours = config.jwt_expiration_hours.min(MAX_TOKEN_TTL_HOURS) as i64;
        Self::with_ttl(&config.jwt_secret, Duration::hours(hours))
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Issue a token for `member_id` valid from now
    pub fn issue(&self, member_id: i32) -> AppResult<IssuedToken> {
        self.issue_at(member_id, Utc::now())
    }

    pub fn issue_at(&self, member_id: i32, now: DateTime<Utc>) -> AppResult<IssuedToken> {
        let iat = now.timestamp();
        let exp = iat
            .checked_add(self.ttl.num_seconds())
            .ok_or_else(|| AppError::Internal("Token expiry out of range".to_string()))?;
        let claims = Claims {
            sub: member_id.to_string(),
            iat,
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| AppError::Internal("Token expiry out of range".to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token and return the member ID it was issued for
    pub fn verify(&self, token: &str) -> AppResult<i32> {
        self.verify_at(token, Utc::now())
    }

    /// Valid while `now <= exp`, with no leeway
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AppResult<i32> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the caller's clock
        validation.validate_exp = false;

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| AppError::InvalidToken(e.to_string()))?;

        if now.timestamp() > data.claims.exp {
            return Err(AppError::InvalidToken("Token expired".to_string()));
        }

        data.claims
            .sub
            .parse::<i32>()
            .map_err(|_| AppError::InvalidToken("Invalid token subject".to_string()))
    }
}
