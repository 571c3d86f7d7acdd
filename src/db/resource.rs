// src/db/resource.rs
// DOCUMENTATION: Common CRUD surface implemented by every entity repository
// PURPOSE: Lets the generic handler factory serve tours, users, reviews and bookings

use crate::db::{QueryFeatures, QueryField};
use crate::errors::AppError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Restriction coming from the route rather than the query string
/// (e.g. reviews nested under /tours/{tour_id}/reviews)
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope {
    pub tour_id: Option<Uuid>,
}

impl Scope {
    pub fn tour(tour_id: Uuid) -> Self {
        Scope {
            tour_id: Some(tour_id),
        }
    }
}

#[async_trait]
pub trait Resource: Serialize + Send + Sync + Sized {
    /// Representation returned by GET /{id}
    type Detail: Serialize + Send;
    type Create: DeserializeOwned + Validate + Send;
    type Update: DeserializeOwned + Validate + Send;

    /// Fields usable for filtering and sorting
    const QUERY_FIELDS: &'static [QueryField];

    async fn find_all(
        pool: &PgPool,
        scope: &Scope,
        features: &QueryFeatures,
    ) -> Result<Vec<Self>, AppError>;

    async fn find_detail(pool: &PgPool, id: Uuid) -> Result<Option<Self::Detail>, AppError>;

    async fn create(pool: &PgPool, input: Self::Create) -> Result<Self, AppError>;

    async fn update(pool: &PgPool, id: Uuid, input: Self::Update)
        -> Result<Option<Self>, AppError>;

    /// Returns false when nothing was deleted
    async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, AppError>;
}
