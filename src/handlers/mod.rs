// src/handlers/mod.rs
// DOCUMENTATION: Handlers module organization
// PURPOSE: Re-export handler components and assemble the route table

pub mod bookings;
pub mod factory;
pub mod health;
pub mod reviews;
pub mod tours;
pub mod users;
pub mod views;

pub use bookings::config as bookings_config;
pub use health::config as health_config;
pub use reviews::config as reviews_config;
pub use tours::config as tours_config;
pub use users::config as users_config;
pub use views::config as views_config;

use crate::errors::AppError;
use crate::services::limit_requests;
use actix_files::Files;
use actix_web::error::{JsonPayloadError, UrlencodedError};
use actix_web::middleware::from_fn;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};

/// Maximum accepted JSON / form body size
pub const BODY_LIMIT: usize = 10 * 1024;

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
            AppError::PayloadTooLarge.into()
        }
        other => AppError::BadRequest(format!("Invalid JSON body: {}", other)).into(),
    }
}

fn form_error(err: UrlencodedError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        UrlencodedError::Overflow { .. } => AppError::PayloadTooLarge.into(),
        other => AppError::BadRequest(format!("Invalid form body: {}", other)).into(),
    }
}

/// Fallback for unmatched routes: JSON under /api, an error page elsewhere
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    let message = format!("Can't find {} on this server!", req.path());
    if req.path().starts_with("/api") {
        AppError::NotFound(message).error_response()
    } else {
        views::PageError::from(AppError::NotFound(message)).error_response()
    }
}

/// Every route, extractor limit and static mount of the application
/// DOCUMENTATION: Shared by main and the endpoint tests; middleware that wraps
/// the whole App (logging, compression, headers) is added in main
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(BODY_LIMIT)
            .error_handler(json_error),
    )
    .app_data(
        web::FormConfig::default()
            .limit(BODY_LIMIT)
            .error_handler(form_error),
    )
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid path parameter: {}", err)).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid query string: {}", err)).into()
    }))
    .configure(health_config)
    .service(
        web::scope("/api/v1")
            .wrap(from_fn(limit_requests))
            .configure(tours_config)
            .configure(users_config)
            .configure(reviews_config)
            .configure(bookings_config),
    )
    .service(Files::new("/css", "public/css"))
    .service(Files::new("/js", "public/js"))
    .service(Files::new("/img", "public/img"))
    .configure(views_config)
    .default_service(web::to(not_found));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::sign_token;
    use crate::config::Config;
    use crate::services::{ApiRateLimiter, Mailer, StripeClient};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    macro_rules! test_app {
        ($limit:expr) => {{
            let config = Config::for_tests();
            let pool = PgPoolOptions::new()
                .acquire_timeout(std::time::Duration::from_secs(1))
                .connect_lazy(&config.database_url)
                .unwrap();
            test::init_service(
                App::new()
                    .app_data(web::Data::new(pool))
                    .app_data(web::Data::new(Mailer::from_config(&config).unwrap()))
                    .app_data(web::Data::new(StripeClient::new(
                        String::new(),
                        config.stripe_webhook_secret.clone(),
                    )))
                    .app_data(web::Data::new(ApiRateLimiter::per_hour($limit)))
                    .app_data(web::Data::new(config))
                    .configure(configure),
            )
            .await
        }};
    }

    async fn json_body(resp: actix_web::dev::ServiceResponse) -> Value {
        let body = test::read_body(resp).await;
        serde_json::from_slice(&body).unwrap()
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test_app!(100);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["service"], "natours");
        assert!(json["database"] == "up" || json["database"] == "down");
    }

    #[actix_web::test]
    async fn test_unknown_api_route_is_404() {
        let app = test_app!(100);
        let req = test::TestRequest::get().uri("/api/v1/planets").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = json_body(resp).await;
        assert_eq!(json["status"], "fail");
        assert_eq!(json["message"], "Can't find /api/v1/planets on this server!");
    }

    #[actix_web::test]
    async fn test_protected_route_without_token() {
        let app = test_app!(100);
        let req = test::TestRequest::get().uri("/api/v1/users/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(resp).await;
        assert_eq!(
            json["message"],
            "You are not logged in! Please log in to get access."
        );
    }

    #[actix_web::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let app = test_app!(100);
        let mut other = Config::for_tests();
        other.jwt_secret = "a-completely-different-signing-secret".to_string();
        let token = sign_token(Uuid::new_v4(), &other).unwrap();

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/tours/{}", Uuid::new_v4()))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_oversized_json_body_is_rejected() {
        let app = test_app!(100);
        let payload = serde_json::json!({
            "email": "laura@example.com",
            "password": "x".repeat(BODY_LIMIT + 1),
        });
        let req = test::TestRequest::post()
            .uri("/api/v1/users/login")
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn test_webhook_without_signature_is_bad_request() {
        let app = test_app!(100);
        let req = test::TestRequest::post()
            .uri("/api/v1/bookings/webhook-checkout")
            .set_payload("{}")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_invalid_latlng_is_bad_request() {
        let app = test_app!(100);
        let req = test::TestRequest::get()
            .uri("/api/v1/tours/tours-within/200/center/not-a-point/unit/mi")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_rate_limit_applies_to_api_only() {
        let app = test_app!(1);

        let first = test::TestRequest::get().uri("/api/v1/users/logout").to_request();
        assert_eq!(test::call_service(&app, first).await.status(), StatusCode::OK);

        let second = test::TestRequest::get().uri("/api/v1/users/logout").to_request();
        let resp = test::call_service(&app, second).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let json = json_body(resp).await;
        assert_eq!(
            json["message"],
            "Too many requests from this IP. Please try again in an hour."
        );

        let health = test::TestRequest::get().uri("/health").to_request();
        assert_eq!(test::call_service(&app, health).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_account_page_requires_login() {
        let app = test_app!(100);
        let req = test::TestRequest::get().uri("/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_account_pages_check_bearer_token() {
        let app = test_app!(100);
        let mut other = Config::for_tests();
        other.jwt_secret = "a-completely-different-signing-secret".to_string();
        let token = sign_token(Uuid::new_v4(), &other).unwrap();

        let req = test::TestRequest::get()
            .uri("/my-tours")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = test::read_body(resp).await;
        let html = std::str::from_utf8(&body).unwrap();
        assert!(html.contains("Invalid token"));
    }

    #[actix_web::test]
    async fn test_huge_page_is_bad_request() {
        let app = test_app!(100);
        let req = test::TestRequest::get()
            .uri("/api/v1/tours?page=9223372036854775807&limit=10")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
