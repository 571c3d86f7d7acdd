// src/db/tour_repository.rs
// DOCUMENTATION: Database access layer for tours
// PURPOSE: CRUD, aggregates and PostGIS queries over the tours table

use crate::db::{FieldKind, QueryFeatures, QueryField, Resource, ReviewRepository, Scope, UserRepository};
use crate::errors::AppError;
use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

/// Columns selected for every tour query
/// DOCUMENTATION: The geography point is split with ST_X()/ST_Y()
const TOUR_COLUMNS: &str = r#"
    t.id, t.name, t.slug, t.duration, t.max_group_size, t.difficulty,
    t.ratings_average, t.ratings_quantity, t.price, t.price_discount,
    t.summary, t.description, t.image_cover, t.images, t.start_dates, t.secret_tour,
    ST_X(t.start_location::geometry) AS start_lng,
    ST_Y(t.start_location::geometry) AS start_lat,
    t.start_address, t.start_description, t.locations, t.guides, t.created_at
"#;

/// Internal struct for mapping database rows to Tour struct
#[derive(Debug, FromRow)]
struct TourRow {
    id: Uuid,
    name: String,
    slug: String,
    duration: i32,
    max_group_size: i32,
    difficulty: Difficulty,
    ratings_average: f64,
    ratings_quantity: i32,
    price: f64,
    price_discount: Option<f64>,
    summary: String,
    description: Option<String>,
    image_cover: String,
    images: Vec<String>,
    start_dates: Vec<DateTime<Utc>>,
    secret_tour: bool,
    start_lng: Option<f64>, // From ST_X(start_location)
    start_lat: Option<f64>, // From ST_Y(start_location)
    start_address: Option<String>,
    start_description: Option<String>,
    locations: Json<Vec<TourLocation>>,
    guides: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl TourRow {
    fn into_tour(self) -> Tour {
        let start_location = match (self.start_lng, self.start_lat) {
            (Some(lng), Some(lat)) => Some(GeoPoint {
                kind: "Point".to_string(),
                coordinates: [lng, lat],
                address: self.start_address,
                description: self.start_description,
            }),
            _ => None,
        };

        Tour {
            id: self.id,
            name: self.name,
            slug: self.slug,
            duration: self.duration,
            duration_weeks: self.duration as f64 / 7.0,
            max_group_size: self.max_group_size,
            difficulty: self.difficulty,
            ratings_average: self.ratings_average,
            ratings_quantity: self.ratings_quantity,
            price: self.price,
            price_discount: self.price_discount,
            summary: self.summary,
            description: self.description,
            image_cover: self.image_cover,
            images: self.images,
            start_dates: self.start_dates,
            secret_tour: self.secret_tour,
            start_location,
            locations: self.locations.0,
            guides: self.guides,
            created_at: self.created_at,
        }
    }
}

/// TourRepository: All database operations for tours
/// DOCUMENTATION: Secret tours are hidden from every public lookup
pub struct TourRepository;

impl TourRepository {
    /// Insert a validated tour
    /// DOCUMENTATION: `id` is only supplied by the seed importer
    pub async fn insert(
        pool: &PgPool,
        id: Option<Uuid>,
        req: &CreateTourRequest,
    ) -> Result<Tour, AppError> {
        let (lng, lat, address, description) = split_start_location(&req.start_location);

        let inserted: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO tours (
                id, name, slug, duration, max_group_size, difficulty,
                ratings_average, price, price_discount, summary, description,
                image_cover, images, start_dates, secret_tour,
                start_location, start_address, start_description,
                locations, guides
            )
            VALUES (
                COALESCE($1, gen_random_uuid()), $2, $3, $4, $5, $6,
                ROUND(COALESCE($7, 4.5)::numeric, 1)::float8, $8, $9, $10, $11,
                $12, $13, $14, $15,
                CASE WHEN $16::float8 IS NULL OR $17::float8 IS NULL THEN NULL
                     ELSE ST_SetSRID(ST_MakePoint($16, $17), 4326)::geography END,
                $18, $19,
                $20, $21
            )
            RETURNING id
            "#,
        )
        .bind(id) // $1
        .bind(&req.name) // $2
        .bind(slugify(&req.name)) // $3
        .bind(req.duration) // $4
        .bind(req.max_group_size) // $5
        .bind(req.difficulty) // $6
        .bind(req.ratings_average) // $7
        .bind(req.price) // $8
        .bind(req.price_discount) // $9
        .bind(&req.summary) // $10
        .bind(&req.description) // $11
        .bind(&req.image_cover) // $12
        .bind(&req.images) // $13
        .bind(&req.start_dates) // $14
        .bind(req.secret_tour) // $15
        .bind(lng) // $16 - longitude
        .bind(lat) // $17 - latitude
        .bind(address) // $18
        .bind(description) // $19
        .bind(Json(&req.locations)) // $20
        .bind(&req.guides) // $21
        .fetch_one(pool)
        .await
        .map_err(|e| {
            log::error!("Failed to create tour {}: {}", req.name, e);
            AppError::from(e)
        })?;

        let tour = Self::fetch(pool, inserted.0, true)
            .await?
            .ok_or_else(AppError::not_found)?;
        log::info!("Created tour with id: {}", tour.id);
        Ok(tour)
    }

    /// Load a tour by id; `include_secret` is only used after writes
    async fn fetch(pool: &PgPool, id: Uuid, include_secret: bool) -> Result<Option<Tour>, AppError> {
        let row = sqlx::query_as::<_, TourRow>(&format!(
            "SELECT {} FROM tours t WHERE t.id = $1 AND ($2 OR NOT t.secret_tour)",
            TOUR_COLUMNS
        ))
        .bind(id)
        .bind(include_secret)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(TourRow::into_tour))
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Tour>, AppError> {
        Self::fetch(pool, id, false).await
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Tour>, AppError> {
        let row = sqlx::query_as::<_, TourRow>(&format!(
            "SELECT {} FROM tours t WHERE t.slug = $1 AND NOT t.secret_tour",
            TOUR_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(TourRow::into_tour))
    }

    /// Tour with guides and reviews populated
    pub async fn load_detail(pool: &PgPool, tour: Tour) -> Result<TourDetail, AppError> {
        let guides = UserRepository::find_guides(pool, &tour.guides).await?;
        let reviews = ReviewRepository::find_for_tour(pool, tour.id).await?;
        Ok(TourDetail {
            tour,
            guides,
            reviews,
        })
    }

    /// Aggregate statistics per difficulty for well rated tours
    pub async fn stats(pool: &PgPool) -> Result<Vec<TourStats>, AppError> {
        let stats = sqlx::query_as::<_, TourStats>(
            r#"
            SELECT
                t.difficulty,
                COUNT(*) AS num_tours,
                COALESCE(SUM(t.ratings_quantity), 0)::bigint AS num_ratings,
                ROUND(AVG(t.ratings_average)::numeric, 2)::float8 AS avg_rating,
                ROUND(AVG(t.price)::numeric, 2)::float8 AS avg_price,
                MIN(t.price) AS min_price,
                MAX(t.price) AS max_price
            FROM tours t
            WHERE t.ratings_average >= 4.5 AND NOT t.secret_tour
            GROUP BY t.difficulty
            ORDER BY avg_price
            "#,
        )
        .fetch_all(pool)
        .await?;
        Ok(stats)
    }

    /// Tour starts per month within `year`, busiest month first
    pub async fn monthly_plan(pool: &PgPool, year: i32) -> Result<Vec<MonthlyPlan>, AppError> {
        let (start, end) = year_bounds(year)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid year: {}", year)))?;

        let plan = sqlx::query_as::<_, MonthlyPlan>(
            r#"
            SELECT
                EXTRACT(MONTH FROM sd.start_date)::int AS month,
                COUNT(*) AS num_tour_starts,
                ARRAY_AGG(t.name ORDER BY t.name) AS tours
            FROM tours t
            CROSS JOIN LATERAL UNNEST(t.start_dates) AS sd(start_date)
            WHERE sd.start_date >= $1 AND sd.start_date < $2 AND NOT t.secret_tour
            GROUP BY month
            ORDER BY num_tour_starts DESC, month
            LIMIT 12
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;
        Ok(plan)
    }

    /// Tours starting within `radius_m` meters of (lat, lng)
    pub async fn within(
        pool: &PgPool,
        lat: f64,
        lng: f64,
        radius_m: f64,
    ) -> Result<Vec<Tour>, AppError> {
        let rows = sqlx::query_as::<_, TourRow>(&format!(
            r#"
            SELECT {} FROM tours t
            WHERE NOT t.secret_tour
              AND t.start_location IS NOT NULL
              AND ST_DWithin(t.start_location, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3)
            ORDER BY t.created_at DESC
            "#,
            TOUR_COLUMNS
        ))
        .bind(lng)
        .bind(lat)
        .bind(radius_m)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(TourRow::into_tour).collect())
    }

    /// Distance from (lat, lng) to every tour start, nearest first
    pub async fn distances(
        pool: &PgPool,
        lat: f64,
        lng: f64,
        unit: DistanceUnit,
    ) -> Result<Vec<TourDistance>, AppError> {
        let distances = sqlx::query_as::<_, TourDistance>(
            r#"
            SELECT
                t.id,
                t.name,
                ST_Distance(t.start_location, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography) / $3
                    AS distance
            FROM tours t
            WHERE NOT t.secret_tour AND t.start_location IS NOT NULL
            ORDER BY distance
            "#,
        )
        .bind(lng)
        .bind(lat)
        .bind(unit.meters())
        .fetch_all(pool)
        .await?;
        Ok(distances)
    }

    /// Tours the user holds a booking for
    pub async fn find_booked_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Tour>, AppError> {
        let rows = sqlx::query_as::<_, TourRow>(&format!(
            r#"
            SELECT {} FROM tours t
            WHERE t.id IN (SELECT b.tour_id FROM bookings b WHERE b.user_id = $1)
            ORDER BY t.name
            "#,
            TOUR_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(TourRow::into_tour).collect())
    }

    pub async fn delete_all(pool: &PgPool) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM tours").execute(pool).await?;
        Ok(result.rows_affected())
    }
}

fn split_start_location(
    location: &Option<GeoPoint>,
) -> (Option<f64>, Option<f64>, Option<String>, Option<String>) {
    match location {
        Some(point) => (
            Some(point.coordinates[0]),
            Some(point.coordinates[1]),
            point.address.clone(),
            point.description.clone(),
        ),
        None => (None, None, None, None),
    }
}

/// [Jan 1 of year, Jan 1 of year + 1) in UTC
fn year_bounds(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
    let end = Utc.with_ymd_and_hms(year.checked_add(1)?, 1, 1, 0, 0, 0).single()?;
    Some((start, end))
}

#[async_trait]
impl Resource for Tour {
    type Detail = TourDetail;
    type Create = CreateTourRequest;
    type Update = UpdateTourRequest;

    const QUERY_FIELDS: &'static [QueryField] = &[
        QueryField::new("name", "t.name", FieldKind::Text),
        QueryField::new("slug", "t.slug", FieldKind::Text),
        QueryField::new("duration", "t.duration", FieldKind::Number),
        QueryField::new("maxGroupSize", "t.max_group_size", FieldKind::Number),
        QueryField::new("difficulty", "t.difficulty", FieldKind::Enum),
        QueryField::new("ratingsAverage", "t.ratings_average", FieldKind::Number),
        QueryField::new("ratingsQuantity", "t.ratings_quantity", FieldKind::Number),
        QueryField::new("price", "t.price", FieldKind::Number),
        QueryField::new("priceDiscount", "t.price_discount", FieldKind::Number),
        QueryField::new("createdAt", "t.created_at", FieldKind::Timestamp),
    ];

    async fn find_all(
        pool: &PgPool,
        _scope: &Scope,
        features: &QueryFeatures,
    ) -> Result<Vec<Self>, AppError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM tours t WHERE NOT t.secret_tour",
            TOUR_COLUMNS
        ));
        features.push_filters(&mut qb);
        features.push_order_and_page(&mut qb, "t.id");

        let rows = qb.build_query_as::<TourRow>().fetch_all(pool).await?;
        Ok(rows.into_iter().map(TourRow::into_tour).collect())
    }

    async fn find_detail(pool: &PgPool, id: Uuid) -> Result<Option<Self::Detail>, AppError> {
        match TourRepository::find_by_id(pool, id).await? {
            Some(tour) => Ok(Some(TourRepository::load_detail(pool, tour).await?)),
            None => Ok(None),
        }
    }

    async fn create(pool: &PgPool, input: Self::Create) -> Result<Self, AppError> {
        let input = input.normalize();
        input.validate()?;
        TourRepository::insert(pool, None, &input).await
    }

    async fn update(
        pool: &PgPool,
        id: Uuid,
        input: Self::Update,
    ) -> Result<Option<Self>, AppError> {
        let Some(current) = TourRepository::fetch(pool, id, true).await? else {
            return Ok(None);
        };

        // Validate the merged document so cross-field rules see stored values
        let merged = input.merge_into(current.to_input());
        merged.validate()?;
        let (lng, lat, address, description) = split_start_location(&merged.start_location);

        sqlx::query(
            r#"
            UPDATE tours
            SET name = $2,
                slug = $3,
                duration = $4,
                max_group_size = $5,
                difficulty = $6,
                price = $7,
                price_discount = $8,
                summary = $9,
                description = $10,
                image_cover = $11,
                images = $12,
                start_dates = $13,
                secret_tour = $14,
                start_location = CASE WHEN $15::float8 IS NULL OR $16::float8 IS NULL THEN NULL
                                      ELSE ST_SetSRID(ST_MakePoint($15, $16), 4326)::geography END,
                start_address = $17,
                start_description = $18,
                locations = $19,
                guides = $20
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&merged.name)
        .bind(slugify(&merged.name))
        .bind(merged.duration)
        .bind(merged.max_group_size)
        .bind(merged.difficulty)
        .bind(merged.price)
        .bind(merged.price_discount)
        .bind(&merged.summary)
        .bind(&merged.description)
        .bind(&merged.image_cover)
        .bind(&merged.images)
        .bind(&merged.start_dates)
        .bind(merged.secret_tour)
        .bind(lng)
        .bind(lat)
        .bind(address)
        .bind(description)
        .bind(Json(&merged.locations))
        .bind(&merged.guides)
        .execute(pool)
        .await
        .map_err(|e| {
            log::error!("Failed to update tour {}: {}", id, e);
            AppError::from(e)
        })?;

        log::info!("Updated tour {}", id);
        TourRepository::fetch(pool, id, true).await
    }

    async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tours WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_bounds() {
        let (start, end) = year_bounds(2021).unwrap();
        assert_eq!(start.to_rfc3339(), "2021-01-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2022-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_split_start_location() {
        let req = sample_tour_request();
        let (lng, lat, address, _) = split_start_location(&req.start_location);
        assert_eq!(lng, Some(-115.570154));
        assert_eq!(lat, Some(51.178456));
        assert!(address.unwrap().contains("Banff"));
        assert_eq!(split_start_location(&None), (None, None, None, None));
    }

    #[test]
    fn test_query_fields_do_not_expose_internal_columns() {
        let names: Vec<&str> = <Tour as Resource>::QUERY_FIELDS.iter().map(|f| f.name).collect();
        assert!(names.contains(&"price"));
        assert!(!names.contains(&"secretTour"));
    }
}
