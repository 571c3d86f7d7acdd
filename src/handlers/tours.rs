// src/handlers/tours.rs
// DOCUMENTATION: HTTP handlers for tour operations
// PURPOSE: CRUD through the factory plus aggregate and geospatial endpoints

use crate::auth::CurrentUser;
use crate::db::{Scope, TourRepository};
use crate::errors::AppError;
use crate::handlers::{factory, reviews};
use crate::models::{
    parse_lat_lng, CreateTourRequest, DistanceUnit, Role, Tour, UpdateTourRequest,
};
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

const TOUR_WRITERS: &[Role] = &[Role::Admin, Role::LeadGuide];
const PLAN_READERS: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];

const LAT_LNG_HINT: &str = "Please provide latitude and longitude in the format lat,lng.";

/// Query used by GET /tours/top-5-cheap; caller-supplied control keys are replaced
fn top_cheap_query(pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = pairs
        .into_iter()
        .filter(|(k, _)| !matches!(k.as_str(), "limit" | "sort" | "fields"))
        .collect();
    pairs.push(("limit".into(), "5".into()));
    pairs.push(("sort".into(), "-ratingsAverage,price".into()));
    pairs.push((
        "fields".into(),
        "name,price,ratingsAverage,summary,difficulty".into(),
    ));
    pairs
}

fn parse_unit(unit: &str) -> Result<DistanceUnit, AppError> {
    DistanceUnit::parse(unit)
        .ok_or_else(|| AppError::BadRequest("Unit must be either 'mi' or 'km'.".to_string()))
}

/// GET /tours
pub async fn get_all_tours(
    pool: web::Data<PgPool>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let pairs = factory::query_pairs(&req)?;
    factory::get_all::<Tour>(&pool, Scope::default(), &pairs).await
}

/// GET /tours/top-5-cheap
pub async fn top_cheap_tours(
    pool: web::Data<PgPool>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let pairs = top_cheap_query(factory::query_pairs(&req)?);
    factory::get_all::<Tour>(&pool, Scope::default(), &pairs).await
}

/// GET /tours/{id}
pub async fn get_tour(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    factory::get_one::<Tour>(&pool, path.into_inner()).await
}

/// POST /tours
pub async fn create_tour(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    body: web::Json<CreateTourRequest>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(TOUR_WRITERS)?;
    factory::create_one::<Tour>(&pool, body.into_inner()).await
}

/// PATCH /tours/{id}
pub async fn update_tour(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateTourRequest>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(TOUR_WRITERS)?;
    factory::update_one::<Tour>(&pool, path.into_inner(), body.into_inner()).await
}

/// DELETE /tours/{id}
pub async fn delete_tour(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(TOUR_WRITERS)?;
    factory::delete_one::<Tour>(&pool, path.into_inner()).await
}

/// GET /tours/tour-stats
pub async fn tour_stats(pool: web::Data<PgPool>) -> Result<HttpResponse, AppError> {
    let stats = TourRepository::stats(&pool).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "stats": stats }
    })))
}

/// GET /tours/monthly-plan/{year}
pub async fn monthly_plan(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(PLAN_READERS)?;
    let raw = path.into_inner();
    let year: i32 = raw
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid year: {}", raw)))?;

    let plan = TourRepository::monthly_plan(&pool, year).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "plan": plan }
    })))
}

/// GET /tours/tours-within/{distance}/center/{latlng}/unit/{unit}
pub async fn tours_within(
    pool: web::Data<PgPool>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, AppError> {
    let (distance, latlng, unit) = path.into_inner();
    let (lat, lng) =
        parse_lat_lng(&latlng).ok_or_else(|| AppError::BadRequest(LAT_LNG_HINT.to_string()))?;
    let unit = parse_unit(&unit)?;
    let distance: f64 = distance
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| AppError::BadRequest("Distance must be a positive number.".to_string()))?;

    let tours = TourRepository::within(&pool, lat, lng, distance * unit.meters()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "results": tours.len(),
        "data": { "data": tours }
    })))
}

/// GET /tours/distances/{latlng}/unit/{unit}
pub async fn distances(
    pool: web::Data<PgPool>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (latlng, unit) = path.into_inner();
    let (lat, lng) =
        parse_lat_lng(&latlng).ok_or_else(|| AppError::BadRequest(LAT_LNG_HINT.to_string()))?;
    let unit = parse_unit(&unit)?;

    let distances = TourRepository::distances(&pool, lat, lng, unit).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "data": distances }
    })))
}

/// Configuration for tour routes (mounted under /api/v1)
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tours")
            .service(web::scope("/{tour_id}/reviews").configure(reviews::routes))
            .route("/top-5-cheap", web::get().to(top_cheap_tours))
            .route("/tour-stats", web::get().to(tour_stats))
            .route("/monthly-plan/{year}", web::get().to(monthly_plan))
            .route(
                "/tours-within/{distance}/center/{latlng}/unit/{unit}",
                web::get().to(tours_within),
            )
            .route("/distances/{latlng}/unit/{unit}", web::get().to(distances))
            .route("", web::get().to(get_all_tours))
            .route("", web::post().to(create_tour))
            .route("/{id}", web::get().to(get_tour))
            .route("/{id}", web::patch().to(update_tour))
            .route("/{id}", web::delete().to(delete_tour)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_cheap_query_overrides_controls() {
        let pairs = top_cheap_query(vec![
            ("limit".into(), "50".into()),
            ("difficulty".into(), "easy".into()),
        ]);

        assert!(pairs.contains(&("difficulty".into(), "easy".into())));
        assert!(pairs.contains(&("limit".into(), "5".into())));
        assert!(!pairs.contains(&("limit".into(), "50".into())));
        assert!(pairs.contains(&("sort".into(), "-ratingsAverage,price".into())));
    }

    #[test]
    fn test_parse_unit() {
        assert!(matches!(parse_unit("mi"), Ok(DistanceUnit::Miles)));
        assert!(matches!(parse_unit("km"), Ok(DistanceUnit::Kilometers)));
        assert!(parse_unit("parsec").is_err());
    }
}
