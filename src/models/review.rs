//! Review model (a member's rating and comment on a book)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Review {
    pub id: i32,
    pub member_id: i32,
    pub book_id: i32,
    /// 1 to 5
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create review request; the reviewer is the authenticated member
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateReview {
    pub book_id: i32,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,
    pub comment: Option<String>,
}

/// Review row ready for insertion
#[derive(Debug, Clone)]
pub struct NewReview {
    pub member_id: i32,
    pub book_id: i32,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Update review request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateReview {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i16>,
    pub comment: Option<String>,
}

/// Average of review ratings, `None` for an empty set
pub fn average_rating(ratings: &[i16]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().map(|&r| r as i64).sum();
    Some(sum as f64 / ratings.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_ratings() {
        assert_eq!(average_rating(&[]), None);
        assert_eq!(average_rating(&[4]), Some(4.0));
        assert_eq!(average_rating(&[5, 4, 3]), Some(4.0));
        assert_eq!(average_rating(&[1, 2]), Some(1.5));
    }
}
