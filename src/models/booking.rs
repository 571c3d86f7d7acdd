// src/models/booking.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Tour reference embedded in a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedTour {
    pub id: Uuid,
    pub name: String,
}

/// Customer reference embedded in a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCustomer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
}

/// Paid booking of a tour by a user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub tour: BookedTour,
    pub user: BookingCustomer,
    pub price: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

/// Request to create a booking (admin or webhook)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub tour: Uuid,
    pub user: Uuid,

    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,

    #[serde(default)]
    pub paid: Option<bool>,
}

/// Request to update a booking
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBookingRequest {
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
    pub paid: Option<bool>,
}
