// src/db/review_repository.rs
// DOCUMENTATION: Review database operations
// PURPOSE: Handle CRUD operations for tour reviews and keep tour ratings in sync

use crate::db::{FieldKind, QueryFeatures, QueryField, Resource, Scope};
use crate::errors::AppError;
use crate::models::{CreateReviewRequest, Review, UpdateReviewRequest, UserSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const REVIEW_COLUMNS: &str = r#"
    r.id, r.review, r.rating, r.tour_id, r.created_at,
    u.id AS user_id, u.name AS user_name, u.photo AS user_photo
"#;

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: Uuid,
    review: String,
    rating: f64,
    tour_id: Uuid,
    created_at: DateTime<Utc>,
    user_id: Uuid,
    user_name: String,
    user_photo: String,
}

impl ReviewRow {
    fn into_review(self) -> Review {
        Review {
            id: self.id,
            review: self.review,
            rating: self.rating,
            tour: self.tour_id,
            user: UserSummary {
                id: self.user_id,
                name: self.user_name,
                photo: self.user_photo,
            },
            created_at: self.created_at,
        }
    }
}

pub struct ReviewRepository;

impl ReviewRepository {
    /// Create a new review and refresh the tour's rating summary
    pub async fn insert(
        pool: &PgPool,
        id: Option<Uuid>,
        review: &str,
        rating: f64,
        tour_id: Uuid,
        user_id: Uuid,
    ) -> Result<Review, AppError> {
        let inserted: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO reviews (id, review, rating, tour_id, user_id)
            VALUES (COALESCE($1, gen_random_uuid()), $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(review)
        .bind(rating)
        .bind(tour_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            log::warn!("Failed to create review for tour {}: {}", tour_id, e);
            match AppError::from(e) {
                AppError::BadRequest(msg) if msg.starts_with("Duplicate") => {
                    AppError::BadRequest("You have already reviewed this tour.".to_string())
                }
                other => other,
            }
        })?;

        Self::calc_average_ratings(pool, tour_id).await?;
        Self::find_by_id(pool, inserted.0)
            .await?
            .ok_or_else(AppError::not_found)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Review>, AppError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {} FROM reviews r JOIN users u ON u.id = r.user_id WHERE r.id = $1",
            REVIEW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(ReviewRow::into_review))
    }

    /// All reviews of a tour, newest first
    pub async fn find_for_tour(pool: &PgPool, tour_id: Uuid) -> Result<Vec<Review>, AppError> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            r#"
            SELECT {} FROM reviews r
            JOIN users u ON u.id = r.user_id
            WHERE r.tour_id = $1
            ORDER BY r.created_at DESC
            "#,
            REVIEW_COLUMNS
        ))
        .bind(tour_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(ReviewRow::into_review).collect())
    }

    /// Recompute ratings_average / ratings_quantity of a tour
    /// DOCUMENTATION: Falls back to 4.5 / 0 when the last review is gone
    pub async fn calc_average_ratings<'e>(
        executor: impl PgExecutor<'e>,
        tour_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE tours
            SET ratings_quantity = s.n,
                ratings_average = CASE WHEN s.n > 0
                                       THEN ROUND(s.avg_rating::numeric, 1)::float8
                                       ELSE 4.5 END
            FROM (
                SELECT COUNT(*)::int AS n, AVG(rating) AS avg_rating
                FROM reviews
                WHERE tour_id = $1
            ) s
            WHERE tours.id = $1
            "#,
        )
        .bind(tour_id)
        .execute(executor)
        .await?;

        log::debug!("Recalculated ratings for tour {}", tour_id);
        Ok(())
    }

    pub async fn delete_all(pool: &PgPool) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM reviews").execute(pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Resource for Review {
    type Detail = Review;
    type Create = CreateReviewRequest;
    type Update = UpdateReviewRequest;

    const QUERY_FIELDS: &'static [QueryField] = &[
        QueryField::new("rating", "r.rating", FieldKind::Number),
        QueryField::new("tour", "r.tour_id", FieldKind::Id),
        QueryField::new("user", "r.user_id", FieldKind::Id),
        QueryField::new("createdAt", "r.created_at", FieldKind::Timestamp),
    ];

    async fn find_all(
        pool: &PgPool,
        scope: &Scope,
        features: &QueryFeatures,
    ) -> Result<Vec<Self>, AppError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM reviews r JOIN users u ON u.id = r.user_id WHERE TRUE",
            REVIEW_COLUMNS
        ));
        if let Some(tour_id) = scope.tour_id {
            qb.push(" AND r.tour_id = ");
            qb.push_bind(tour_id);
        }
        features.push_filters(&mut qb);
        features.push_order_and_page(&mut qb, "r.id");

        let rows = qb.build_query_as::<ReviewRow>().fetch_all(pool).await?;
        Ok(rows.into_iter().map(ReviewRow::into_review).collect())
    }

    async fn find_detail(pool: &PgPool, id: Uuid) -> Result<Option<Self::Detail>, AppError> {
        ReviewRepository::find_by_id(pool, id).await
    }

    async fn create(pool: &PgPool, input: Self::Create) -> Result<Self, AppError> {
        let tour_id = input
            .tour
            .ok_or_else(|| AppError::BadRequest("Review must belong to a tour.".to_string()))?;
        let user_id = input
            .user
            .ok_or_else(|| AppError::BadRequest("Review must belong to a user.".to_string()))?;
        ReviewRepository::insert(pool, None, input.review.trim(), input.rating, tour_id, user_id)
            .await
    }

    async fn update(
        pool: &PgPool,
        id: Uuid,
        input: Self::Update,
    ) -> Result<Option<Self>, AppError> {
        let updated: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE reviews
            SET review = COALESCE($2, review),
                rating = COALESCE($3, rating),
                updated_at = NOW()
            WHERE id = $1
            RETURNING tour_id
            "#,
        )
        .bind(id)
        .bind(input.review.map(|r| r.trim().to_string()))
        .bind(input.rating)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some((tour_id,)) => {
                ReviewRepository::calc_average_ratings(pool, tour_id).await?;
                ReviewRepository::find_by_id(pool, id).await
            }
            None => Ok(None),
        }
    }

    async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let deleted: Option<(Uuid,)> =
            sqlx::query_as("DELETE FROM reviews WHERE id = $1 RETURNING tour_id")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        match deleted {
            Some((tour_id,)) => {
                ReviewRepository::calc_average_ratings(pool, tour_id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
