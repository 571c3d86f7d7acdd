// src/models/tour.rs
// DOCUMENTATION: Core data structures for tours
// PURPOSE: Defines serialization/validation models for the tours API and views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{GuideSummary, Review};

/// Tour difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tour_difficulty", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

/// GeoJSON point used for the start location
/// `coordinates` is [longitude, latitude]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,
    pub coordinates: [f64; 2],
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A stop on the tour itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourLocation {
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,
    pub coordinates: [f64; 2],
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub day: Option<i32>,
}

fn point_type() -> String {
    "Point".to_string()
}

/// Represents a complete tour record
/// DOCUMENTATION: Built from `TourRow` in the repository, where the PostGIS
/// start location is split into longitude/latitude columns
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,

    /// Length in days
    pub duration: i32,

    /// Computed: duration / 7
    pub duration_weeks: f64,

    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    pub start_location: Option<GeoPoint>,
    pub locations: Vec<TourLocation>,

    /// Guide user ids
    pub guides: Vec<Uuid>,

    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
}

impl Tour {
    /// Current values as a create payload; used to validate partial updates
    pub fn to_input(&self) -> CreateTourRequest {
        CreateTourRequest {
            name: self.name.clone(),
            duration: self.duration,
            max_group_size: self.max_group_size,
            difficulty: self.difficulty,
            ratings_average: Some(self.ratings_average),
            price: self.price,
            price_discount: self.price_discount,
            summary: self.summary.clone(),
            description: self.description.clone(),
            image_cover: self.image_cover.clone(),
            images: self.images.clone(),
            start_dates: self.start_dates.clone(),
            secret_tour: self.secret_tour,
            start_location: self.start_location.clone(),
            locations: self.locations.clone(),
            guides: self.guides.clone(),
        }
    }

    /// First start date, used on overview cards
    pub fn next_start(&self) -> Option<&DateTime<Utc>> {
        self.start_dates.first()
    }
}

/// Tour with guides and reviews populated (GET /tours/{id}, /tour/{slug})
#[derive(Debug, Clone)]
pub struct TourDetail {
    pub tour: Tour,
    pub guides: Vec<GuideSummary>,
    pub reviews: Vec<Review>,
}

impl Serialize for TourDetail {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error;

        let mut value = serde_json::to_value(&self.tour).map_err(S::Error::custom)?;
        value["guides"] = serde_json::to_value(&self.guides).map_err(S::Error::custom)?;
        value["reviews"] = serde_json::to_value(&self.reviews).map_err(S::Error::custom)?;
        value.serialize(serializer)
    }
}

/// Request DTO for creating a tour
/// DOCUMENTATION: Also the merge target for partial updates so the same
/// rules apply on PATCH
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_price_discount", skip_on_field_errors = false))]
pub struct CreateTourRequest {
    #[validate(length(
        min = 5,
        max = 40,
        message = "Name must be between 5 and 40 characters long"
    ))]
    pub name: String,

    #[validate(range(min = 1, message = "Duration must be at least one day"))]
    pub duration: i32,

    #[validate(range(min = 1, message = "maxGroupSize must be at least 1"))]
    pub max_group_size: i32,

    pub difficulty: Difficulty,

    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    #[serde(default)]
    pub ratings_average: Option<f64>,

    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,

    #[serde(default)]
    pub price_discount: Option<f64>,

    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: String,

    #[serde(default)]
    pub description: Option<String>,

    #[validate(length(min = 1, message = "A tour must have a cover image"))]
    pub image_cover: String,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,

    #[serde(default)]
    pub secret_tour: bool,

    #[serde(default)]
    pub start_location: Option<GeoPoint>,

    #[serde(default)]
    pub locations: Vec<TourLocation>,

    #[serde(default)]
    pub guides: Vec<Uuid>,
}

impl CreateTourRequest {
    pub fn normalize(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.summary = self.summary.trim().to_string();
        self.description = self.description.map(|d| d.trim().to_string());
        self
    }
}

fn validate_price_discount(req: &CreateTourRequest) -> Result<(), ValidationError> {
    match req.price_discount {
        Some(discount) if discount >= req.price => {
            let mut err = ValidationError::new("price_discount");
            err.message = Some(
                format!("Discount ({}) must be below the regular price", discount).into(),
            );
            Err(err)
        }
        _ => Ok(()),
    }
}

/// Request DTO for PATCH /tours/{id}
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTourRequest {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
    pub start_location: Option<GeoPoint>,
    pub locations: Option<Vec<TourLocation>>,
    pub guides: Option<Vec<Uuid>>,
}

impl UpdateTourRequest {
    /// Overlay the provided fields on an existing tour's values
    pub fn merge_into(self, mut input: CreateTourRequest) -> CreateTourRequest {
        if let Some(v) = self.name {
            input.name = v;
        }
        if let Some(v) = self.duration {
            input.duration = v;
        }
        if let Some(v) = self.max_group_size {
            input.max_group_size = v;
        }
        if let Some(v) = self.difficulty {
            input.difficulty = v;
        }
        if let Some(v) = self.price {
            input.price = v;
        }
        if self.price_discount.is_some() {
            input.price_discount = self.price_discount;
        }
        if let Some(v) = self.summary {
            input.summary = v;
        }
        if self.description.is_some() {
            input.description = self.description;
        }
        if let Some(v) = self.image_cover {
            input.image_cover = v;
        }
        if let Some(v) = self.images {
            input.images = v;
        }
        if let Some(v) = self.start_dates {
            input.start_dates = v;
        }
        if let Some(v) = self.secret_tour {
            input.secret_tour = v;
        }
        if self.start_location.is_some() {
            input.start_location = self.start_location;
        }
        if let Some(v) = self.locations {
            input.locations = v;
        }
        if let Some(v) = self.guides {
            input.guides = v;
        }
        input.normalize()
    }
}

/// Aggregated statistics per difficulty (GET /tours/tour-stats)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TourStats {
    pub difficulty: Difficulty,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Tour starts per month (GET /tours/monthly-plan/{year})
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    pub month: i32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}

/// Distance from a point to a tour's start (GET /tours/distances/...)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TourDistance {
    pub id: Uuid,
    pub name: String,
    pub distance: f64,
}

/// Unit for geospatial queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Miles,
    Kilometers,
}

impl DistanceUnit {
    pub fn parse(unit: &str) -> Option<Self> {
        match unit {
            "mi" => Some(DistanceUnit::Miles),
            "km" => Some(DistanceUnit::Kilometers),
            _ => None,
        }
    }

    /// Meters in one unit
    pub fn meters(&self) -> f64 {
        match self {
            DistanceUnit::Miles => 1609.344,
            DistanceUnit::Kilometers => 1000.0,
        }
    }
}

/// Parse a "lat,lng" path segment
pub fn parse_lat_lng(latlng: &str) -> Option<(f64, f64)> {
    let (lat, lng) = latlng.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }
    Some((lat, lng))
}

/// URL-friendly slug from a tour name
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
pub(crate) fn sample_tour_request() -> CreateTourRequest {
    CreateTourRequest {
        name: "The Forest Hiker".to_string(),
        duration: 5,
        max_group_size: 25,
        difficulty: Difficulty::Easy,
        ratings_average: None,
        price: 397.0,
        price_discount: None,
        summary: "Breathtaking hike through the Canadian Banff National Park".to_string(),
        description: None,
        image_cover: "tour-1-cover.jpg".to_string(),
        images: vec![],
        start_dates: vec![],
        secret_tour: false,
        start_location: Some(GeoPoint {
            kind: "Point".to_string(),
            coordinates: [-115.570154, 51.178456],
            address: Some("224 Banff Ave, Banff, AB, Canada".to_string()),
            description: Some("Banff, CAN".to_string()),
        }),
        locations: vec![],
        guides: vec![],
    }
}

#[cfg(test)]
pub(crate) fn sample_tour() -> Tour {
    let req = sample_tour_request();
    Tour {
        id: Uuid::new_v4(),
        slug: slugify(&req.name),
        name: req.name,
        duration: req.duration,
        duration_weeks: req.duration as f64 / 7.0,
        max_group_size: req.max_group_size,
        difficulty: req.difficulty,
        ratings_average: 4.5,
        ratings_quantity: 0,
        price: req.price,
        price_discount: req.price_discount,
        summary: req.summary,
        description: req.description,
        image_cover: req.image_cover,
        images: req.images,
        start_dates: req.start_dates,
        secret_tour: false,
        start_location: req.start_location,
        locations: req.locations,
        guides: req.guides,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
        assert_eq!(slugify("  The Sea  Explorer "), "the-sea-explorer");
        assert_eq!(slugify("Wine & Dine Tour"), "wine-dine-tour");
    }

    #[test]
    fn test_create_request_validation() {
        assert!(sample_tour_request().validate().is_ok());

        let mut short_name = sample_tour_request();
        short_name.name = "Hike".to_string();
        assert!(short_name.validate().is_err());

        let mut long_name = sample_tour_request();
        long_name.name = "x".repeat(41);
        assert!(long_name.validate().is_err());
    }

    #[test]
    fn test_price_discount_must_be_below_price() {
        let mut req = sample_tour_request();
        req.price_discount = Some(100.0);
        assert!(req.validate().is_ok());

        req.price_discount = Some(397.0);
        let errors = req.validate().unwrap_err();
        assert!(errors.errors().contains_key("__all__"));
    }

    #[test]
    fn test_unknown_difficulty_is_rejected() {
        let body = r#"{"name":"The Forest Hiker","duration":5,"maxGroupSize":25,
            "difficulty":"extreme","price":397,"summary":"s","imageCover":"c.jpg"}"#;
        assert!(serde_json::from_str::<CreateTourRequest>(body).is_err());
    }

    #[test]
    fn test_update_merge_keeps_untouched_fields() {
        let tour = sample_tour();
        let patch = UpdateTourRequest {
            price: Some(499.0),
            name: Some("  The Forest Walker ".to_string()),
            ..Default::default()
        };
        let merged = patch.merge_into(tour.to_input());
        assert_eq!(merged.price, 499.0);
        assert_eq!(merged.name, "The Forest Walker");
        assert_eq!(merged.duration, tour.duration);
        assert_eq!(merged.start_location, tour.start_location);
    }

    #[test]
    fn test_merged_discount_is_checked_against_stored_price() {
        let tour = sample_tour();
        let patch = UpdateTourRequest {
            price_discount: Some(1000.0),
            ..Default::default()
        };
        assert!(patch.merge_into(tour.to_input()).validate().is_err());
    }

    #[test]
    fn test_serialized_tour_shape() {
        let tour = sample_tour();
        let json = serde_json::to_value(&tour).unwrap();
        assert_eq!(json["slug"], "the-forest-hiker");
        assert_eq!(json["difficulty"], "easy");
        assert_eq!(json["startLocation"]["type"], "Point");
        assert!((json["durationWeeks"].as_f64().unwrap() - 5.0 / 7.0).abs() < 1e-9);
        assert!(json.get("createdAt").is_none());
    }

    #[test]
    fn test_detail_embeds_guides_and_reviews() {
        let detail = TourDetail {
            tour: sample_tour(),
            guides: vec![],
            reviews: vec![],
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert!(json["guides"].as_array().unwrap().is_empty());
        assert!(json["reviews"].as_array().unwrap().is_empty());
        assert_eq!(json["name"], "The Forest Hiker");
    }

    #[test]
    fn test_parse_lat_lng() {
        assert_eq!(parse_lat_lng("34.111745,-118.113491"), Some((34.111745, -118.113491)));
        assert_eq!(parse_lat_lng("34.1"), None);
        assert_eq!(parse_lat_lng("abc,def"), None);
        assert_eq!(parse_lat_lng("95.0,10.0"), None);
    }

    #[test]
    fn test_distance_unit() {
        assert_eq!(DistanceUnit::parse("mi"), Some(DistanceUnit::Miles));
        assert_eq!(DistanceUnit::parse("km"), Some(DistanceUnit::Kilometers));
        assert_eq!(DistanceUnit::parse("ft"), None);
        assert_eq!(DistanceUnit::Kilometers.meters(), 1000.0);
    }
}
