// src/handlers/factory.rs
// DOCUMENTATION: Generic CRUD handlers
// PURPOSE: One implementation of list/get/create/update/delete for every Resource

use crate::db::{QueryFeatures, Resource, Scope};
use crate::errors::AppError;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Raw `key=value` pairs of the request query string, in order
pub fn query_pairs(req: &HttpRequest) -> Result<Vec<(String, String)>, AppError> {
    web::Query::<Vec<(String, String)>>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .map_err(|e| AppError::BadRequest(format!("Invalid query string: {}", e)))
}

/// Public origin of this server as seen by the client (used in mails and Stripe URLs)
pub fn site_url(req: &HttpRequest) -> String {
    let info = req.connection_info();
    format!("{}://{}", info.scheme(), info.host())
}

/// `{"status":"success","data":{"data":doc}}`
pub fn document<T: Serialize>(status: actix_web::http::StatusCode, doc: &T) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "status": "success",
        "data": { "data": doc }
    }))
}

pub async fn get_all<R: Resource>(
    pool: &PgPool,
    scope: Scope,
    pairs: &[(String, String)],
) -> Result<HttpResponse, AppError> {
    let features = QueryFeatures::parse(pairs, R::QUERY_FIELDS)?;
    let docs = R::find_all(pool, &scope, &features).await?;
    let docs = features.project(&docs)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "results": docs.len(),
        "data": { "data": docs }
    })))
}

pub async fn get_one<R: Resource>(pool: &PgPool, id: Uuid) -> Result<HttpResponse, AppError> {
    let doc = R::find_detail(pool, id)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(document(actix_web::http::StatusCode::OK, &doc))
}

pub async fn create_one<R: Resource>(
    pool: &PgPool,
    input: R::Create,
) -> Result<HttpResponse, AppError> {
    input.validate()?;
    let doc = R::create(pool, input).await?;
    Ok(document(actix_web::http::StatusCode::CREATED, &doc))
}

pub async fn update_one<R: Resource>(
    pool: &PgPool,
    id: Uuid,
    input: R::Update,
) -> Result<HttpResponse, AppError> {
    input.validate()?;
    let doc = R::update(pool, id, input)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(document(actix_web::http::StatusCode::OK, &doc))
}

pub async fn delete_one<R: Resource>(pool: &PgPool, id: Uuid) -> Result<HttpResponse, AppError> {
    if !R::delete(pool, id).await? {
        return Err(AppError::not_found());
    }
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;

    #[test]
    fn test_query_pairs_keep_repeats_and_brackets() {
        let req = TestRequest::with_uri("/api/v1/tours?difficulty=easy&difficulty=medium&price%5Blt%5D=1500")
            .to_http_request();
        let pairs = query_pairs(&req).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("difficulty".to_string(), "easy".to_string()),
                ("difficulty".to_string(), "medium".to_string()),
                ("price[lt]".to_string(), "1500".to_string()),
            ]
        );
    }

    #[actix_web::test]
    async fn test_document_envelope() {
        let resp = document(StatusCode::CREATED, &json!({ "name": "The Sea Explorer" }));
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["data"]["name"], "The Sea Explorer");
    }
}
