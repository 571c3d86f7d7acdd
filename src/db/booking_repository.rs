// src/db/booking_repository.rs
// DOCUMENTATION: Booking database operations
// PURPOSE: Record paid tour bookings and read them back with tour/user populated

use crate::db::{FieldKind, QueryFeatures, QueryField, Resource, Scope};
use crate::errors::AppError;
use crate::models::{
    BookedTour, Booking, BookingCustomer, CreateBookingRequest, UpdateBookingRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const BOOKING_COLUMNS: &str = r#"
    b.id, b.price, b.paid, b.created_at,
    t.id AS tour_id, t.name AS tour_name,
    u.id AS user_id, u.name AS user_name, u.email AS user_email, u.photo AS user_photo
"#;

const BOOKING_FROM: &str = r#"
    FROM bookings b
    JOIN tours t ON t.id = b.tour_id
    JOIN users u ON u.id = b.user_id
"#;

#[derive(Debug, FromRow)]
struct BookingRow {
    id: Uuid,
    price: f64,
    paid: bool,
    created_at: DateTime<Utc>,
    tour_id: Uuid,
    tour_name: String,
    user_id: Uuid,
    user_name: String,
    user_email: String,
    user_photo: String,
}

impl BookingRow {
    fn into_booking(self) -> Booking {
        Booking {
            id: self.id,
            tour: BookedTour {
                id: self.tour_id,
                name: self.tour_name,
            },
            user: BookingCustomer {
                id: self.user_id,
                name: self.user_name,
                email: self.user_email,
                photo: self.user_photo,
            },
            price: self.price,
            paid: self.paid,
            created_at: self.created_at,
        }
    }
}

pub struct BookingRepository;

impl BookingRepository {
    pub async fn insert(pool: &PgPool, req: &CreateBookingRequest) -> Result<Booking, AppError> {
        let inserted: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO bookings (tour_id, user_id, price, paid)
            VALUES ($1, $2, $3, COALESCE($4, TRUE))
            RETURNING id
            "#,
        )
        .bind(req.tour)
        .bind(req.user)
        .bind(req.price)
        .bind(req.paid)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            log::error!("Failed to create booking for tour {}: {}", req.tour, e);
            AppError::from(e)
        })?;

        log::info!(
            "Created booking {} (tour {}, user {})",
            inserted.0,
            req.tour,
            req.user
        );
        Self::find_by_id(pool, inserted.0)
            .await?
            .ok_or_else(AppError::not_found)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Booking>, AppError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} {} WHERE b.id = $1",
            BOOKING_COLUMNS, BOOKING_FROM
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(BookingRow::into_booking))
    }
}

#[async_trait]
impl Resource for Booking {
    type Detail = Booking;
    type Create = CreateBookingRequest;
    type Update = UpdateBookingRequest;

    const QUERY_FIELDS: &'static [QueryField] = &[
        QueryField::new("price", "b.price", FieldKind::Number),
        QueryField::new("paid", "b.paid", FieldKind::Bool),
        QueryField::new("tour", "b.tour_id", FieldKind::Id),
        QueryField::new("user", "b.user_id", FieldKind::Id),
        QueryField::new("createdAt", "b.created_at", FieldKind::Timestamp),
    ];

    async fn find_all(
        pool: &PgPool,
        scope: &Scope,
        features: &QueryFeatures,
    ) -> Result<Vec<Self>, AppError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} {} WHERE TRUE",
            BOOKING_COLUMNS, BOOKING_FROM
        ));
        if let Some(tour_id) = scope.tour_id {
            qb.push(" AND b.tour_id = ");
            qb.push_bind(tour_id);
        }
        features.push_filters(&mut qb);
        features.push_order_and_page(&mut qb, "b.id");

        let rows = qb.build_query_as::<BookingRow>().fetch_all(pool).await?;
        Ok(rows.into_iter().map(BookingRow::into_booking).collect())
    }

    async fn find_detail(pool: &PgPool, id: Uuid) -> Result<Option<Self::Detail>, AppError> {
        BookingRepository::find_by_id(pool, id).await
    }

    async fn create(pool: &PgPool, input: Self::Create) -> Result<Self, AppError> {
        BookingRepository::insert(pool, &input).await
    }

    async fn update(
        pool: &PgPool,
        id: Uuid,
        input: Self::Update,
    ) -> Result<Option<Self>, AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE bookings
            SET price = COALESCE($2, price),
                paid = COALESCE($3, paid),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(input.price)
        .bind(input.paid)
        .execute(pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        BookingRepository::find_by_id(pool, id).await
    }

    async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
