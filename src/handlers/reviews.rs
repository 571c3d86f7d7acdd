// src/handlers/reviews.rs
// DOCUMENTATION: HTTP handlers for reviews
// PURPOSE: Served at /api/v1/reviews and nested at /api/v1/tours/{tour_id}/reviews

use crate::auth::CurrentUser;
use crate::db::Scope;
use crate::errors::AppError;
use crate::handlers::factory;
use crate::models::{CreateReviewRequest, Review, Role, UpdateReviewRequest};
use actix_web::{web, HttpRequest, HttpResponse};
use sqlx::PgPool;
use uuid::Uuid;

const REVIEW_EDITORS: &[Role] = &[Role::User, Role::Admin];

/// Tour id from the enclosing /tours/{tour_id}/reviews scope, if any
fn nested_tour(req: &HttpRequest) -> Result<Option<Uuid>, AppError> {
    match req.match_info().get("tour_id") {
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid tour id: {}", raw))),
        None => Ok(None),
    }
}

/// GET /reviews
pub async fn get_all_reviews(
    pool: web::Data<PgPool>,
    _user: CurrentUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let scope = match nested_tour(&req)? {
        Some(tour_id) => Scope::tour(tour_id),
        None => Scope::default(),
    };
    let pairs = factory::query_pairs(&req)?;
    factory::get_all::<Review>(&pool, scope, &pairs).await
}

/// POST /reviews
/// Tour defaults to the nested route, user to the caller
pub async fn create_review(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    req: HttpRequest,
    body: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(&[Role::User])?;

    let mut input = body.into_inner();
    if input.tour.is_none() {
        input.tour = nested_tour(&req)?;
    }
    if input.user.is_none() {
        input.user = Some(user.id);
    }

    factory::create_one::<Review>(&pool, input).await
}

/// GET /reviews/{id}
pub async fn get_review(
    pool: web::Data<PgPool>,
    _user: CurrentUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    factory::get_one::<Review>(&pool, path.into_inner()).await
}

/// PATCH /reviews/{id}
pub async fn update_review(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateReviewRequest>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(REVIEW_EDITORS)?;
    factory::update_one::<Review>(&pool, path.into_inner(), body.into_inner()).await
}

/// DELETE /reviews/{id}
pub async fn delete_review(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(REVIEW_EDITORS)?;
    factory::delete_one::<Review>(&pool, path.into_inner()).await
}

/// Routes shared by the top-level and the nested scope
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(get_all_reviews))
        .route("", web::post().to(create_review))
        .route("/{id}", web::get().to(get_review))
        .route("/{id}", web::patch().to(update_review))
        .route("/{id}", web::delete().to(delete_review));
}

/// Configuration for review routes (mounted under /api/v1)
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/reviews").configure(routes));
}
