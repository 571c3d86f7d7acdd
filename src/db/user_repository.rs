// src/db/user_repository.rs
// DOCUMENTATION: User database operations
// PURPOSE: Accounts, credentials and password-reset state

use crate::auth::password;
use crate::db::{FieldKind, QueryFeatures, QueryField, Resource, ReviewRepository, Scope};
use crate::errors::AppError;
use crate::models::{GuideSummary, Role, SignupRequest, UpdateUserRequest, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const USER_COLUMNS: &str = r#"
    u.id, u.name, u.email, u.photo, u.role, u.password,
    u.password_changed_at, u.password_reset_token, u.password_reset_expires,
    u.active, u.created_at, u.updated_at
"#;

pub struct UserRepository;

impl UserRepository {
    /// Insert a user with an already hashed password
    /// DOCUMENTATION: `id` is only supplied by the seed importer
    pub async fn insert(
        pool: &PgPool,
        id: Option<Uuid>,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        photo: Option<&str>,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users AS u (id, name, email, password, role, photo)
            VALUES (COALESCE($1, gen_random_uuid()), $2, $3, $4, $5, COALESCE($6, 'default.jpg'))
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(photo)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            log::warn!("Failed to create user {}: {}", email, e);
            AppError::from(e)
        })?;

        log::info!("Created user with id: {}", user.id);
        Ok(user)
    }

    /// Active user by id
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users u WHERE u.id = $1 AND u.active",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    /// Active user by (lowercased) email
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users u WHERE u.email = $1 AND u.active",
            USER_COLUMNS
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    /// User whose unexpired reset token hashes to `hashed_token`
    pub async fn find_by_reset_token(
        pool: &PgPool,
        hashed_token: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {} FROM users u
            WHERE u.password_reset_token = $1
              AND u.password_reset_expires > NOW()
              AND u.active
            "#,
            USER_COLUMNS
        ))
        .bind(hashed_token)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    /// Store or clear the hashed reset token
    pub async fn set_reset_token(
        pool: &PgPool,
        id: Uuid,
        hashed_token: Option<&str>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = $2, password_reset_expires = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(hashed_token)
        .bind(expires)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Replace the password hash
    /// DOCUMENTATION: password_changed_at is backdated one second so a token
    /// issued right after the change is still accepted
    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users AS u
            SET password = $2,
                password_changed_at = NOW() - INTERVAL '1 second',
                password_reset_token = NULL,
                password_reset_expires = NULL,
                updated_at = NOW()
            WHERE u.id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(password_hash)
        .fetch_one(pool)
        .await?;

        log::info!("Password changed for user {}", id);
        Ok(user)
    }

    /// Update name and/or email of the current user
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users AS u
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE u.id = $1 AND u.active
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_one(pool)
        .await?;
        Ok(user)
    }

    /// Soft delete
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        log::info!("Deactivated user {}", id);
        Ok(())
    }

    /// Guide summaries in the order of `ids`
    pub async fn find_guides(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<GuideSummary>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let guides = sqlx::query_as::<_, GuideSummary>(
            r#"
            SELECT u.id, u.name, u.email, u.photo, u.role
            FROM users u
            WHERE u.id = ANY($1) AND u.active
            ORDER BY array_position($1, u.id)
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;
        Ok(guides)
    }

    pub async fn delete_all(pool: &PgPool) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM users").execute(pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Resource for User {
    type Detail = User;
    type Create = SignupRequest;
    type Update = UpdateUserRequest;

    const QUERY_FIELDS: &'static [QueryField] = &[
        QueryField::new("name", "u.name", FieldKind::Text),
        QueryField::new("email", "u.email", FieldKind::Text),
        QueryField::new("role", "u.role", FieldKind::Enum),
        QueryField::new("createdAt", "u.created_at", FieldKind::Timestamp),
    ];

    async fn find_all(
        pool: &PgPool,
        _scope: &Scope,
        features: &QueryFeatures,
    ) -> Result<Vec<Self>, AppError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM users u WHERE u.active", USER_COLUMNS));
        features.push_filters(&mut qb);
        features.push_order_and_page(&mut qb, "u.id");

        let users = qb.build_query_as::<User>().fetch_all(pool).await?;
        Ok(users)
    }

    async fn find_detail(pool: &PgPool, id: Uuid) -> Result<Option<Self::Detail>, AppError> {
        UserRepository::find_by_id(pool, id).await
    }

    async fn create(pool: &PgPool, input: Self::Create) -> Result<Self, AppError> {
        let input = input.normalize();
        let hash = password::hash_password(input.password).await?;
        UserRepository::insert(pool, None, &input.name, &input.email, &hash, Role::User, None).await
    }

    async fn update(
        pool: &PgPool,
        id: Uuid,
        input: Self::Update,
    ) -> Result<Option<Self>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users AS u
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                photo = COALESCE($4, photo),
                role = COALESCE($5, role),
                updated_at = NOW()
            WHERE u.id = $1 AND u.active
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(input.name.map(|n| n.trim().to_string()))
        .bind(input.email.map(|e| e.trim().to_lowercase()))
        .bind(input.photo)
        .bind(input.role)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    /// Hard delete; the user's reviews go first so their tours' ratings are recomputed
    async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let mut tx = pool.begin().await?;

        let mut tour_ids: Vec<Uuid> = sqlx::query_scalar(
            "DELETE FROM reviews WHERE user_id = $1 RETURNING tour_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        tour_ids.sort_unstable();
        tour_ids.dedup();
        for tour_id in &tour_ids {
            ReviewRepository::calc_average_ratings(&mut *tx, *tour_id).await?;
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        log::info!(
            "Deleted user {} and refreshed ratings of {} tours",
            id,
            tour_ids.len()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{init_db_pool, Config};
    use crate::db::TourRepository;
    use crate::models::tour::sample_tour_request;
    use crate::models::Tour;

    #[tokio::test]
    #[ignore = "needs a PostGIS database at DATABASE_URL"]
    async fn test_deleting_user_refreshes_tour_ratings() {
        let mut config = Config::for_tests();
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
        let pool = init_db_pool(&config).await.unwrap();
        let suffix = &Uuid::new_v4().simple().to_string()[..8];

        let mut req = sample_tour_request();
        req.name = format!("Rating Check {}", suffix);
        let tour = TourRepository::insert(&pool, None, &req).await.unwrap();

        let email = format!("reviewer-{}@example.com", suffix);
        let user = UserRepository::insert(&pool, None, "Reviewer", &email, "x", Role::User, None)
            .await
            .unwrap();
        ReviewRepository::insert(&pool, None, "Fine", 3.0, tour.id, user.id)
            .await
            .unwrap();

        let rated = TourRepository::find_by_id(&pool, tour.id).await.unwrap().unwrap();
        assert_eq!(rated.ratings_quantity, 1);
        assert_eq!(rated.ratings_average, 3.0);

        assert!(User::delete(&pool, user.id).await.unwrap());
        assert!(!User::delete(&pool, user.id).await.unwrap());

        let refreshed = TourRepository::find_by_id(&pool, tour.id).await.unwrap().unwrap();
        assert_eq!(refreshed.ratings_quantity, 0);
        assert_eq!(refreshed.ratings_average, 4.5);

        assert!(Tour::delete(&pool, tour.id).await.unwrap());
    }
}
