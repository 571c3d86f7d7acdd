// src/models/review.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::UserSummary;

/// Tour review with its author populated
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub tour: Uuid,
    pub user: UserSummary,
    pub created_at: DateTime<Utc>,
}

/// Request to create a new review
/// `tour` and `user` default to the nested route and the current user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(length(min = 1, message = "Review can not be empty"))]
    pub review: String,

    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub rating: f64,

    #[serde(default)]
    pub tour: Option<Uuid>,

    #[serde(default)]
    pub user: Option<Uuid>,
}

/// Request to update a review
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(length(min = 1, message = "Review can not be empty"))]
    pub review: Option<String>,

    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub rating: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        let mut req = CreateReviewRequest {
            review: "Amazing!".to_string(),
            rating: 5.0,
            tour: None,
            user: None,
        };
        assert!(req.validate().is_ok());
        req.rating = 0.5;
        assert!(req.validate().is_err());

        let update = UpdateReviewRequest {
            rating: Some(6.0),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_serialized_author() {
        let review = Review {
            id: Uuid::new_v4(),
            review: "Great guides".to_string(),
            rating: 4.0,
            tour: Uuid::new_v4(),
            user: UserSummary {
                id: Uuid::new_v4(),
                name: "Lourdes Browning".to_string(),
                photo: "user-2.jpg".to_string(),
            },
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&review).unwrap();
        assert_eq!(json["user"]["name"], "Lourdes Browning");
        assert!(json.get("createdAt").is_some());
    }
}
