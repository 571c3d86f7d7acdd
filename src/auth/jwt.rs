// src/auth/jwt.rs
// DOCUMENTATION: Session token issuing and verification
// PURPOSE: HS256 tokens carried in the Authorization header or the `jwt` cookie

use crate::config::Config;
use crate::errors::AppError;
use crate::models::User;
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{http::StatusCode, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

pub const AUTH_COOKIE: &str = "jwt";

/// Placeholder value written on logout so the browser drops the session
pub const LOGGED_OUT: &str = "loggedout";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub id: Uuid,
    /// Issued at (unix seconds)
    pub iat: i64,
    pub exp: i64,
}

pub fn sign_token(user_id: Uuid, config: &Config) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        id: user_id,
        iat: now.timestamp(),
        exp: (now + Duration::days(config.jwt_expires_in_days)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("Failed to sign token: {}", e)))
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

/// Bearer header first, then the cookie
pub fn token_from_request(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| cookie_token(req))
}

pub fn cookie_token(req: &HttpRequest) -> Option<String> {
    req.cookie(AUTH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty() && v != LOGGED_OUT)
}

pub fn auth_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE, token)
        .path("/")
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::days(config.jwt_cookie_expires_in_days))
        .finish()
}

pub fn logout_cookie() -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE, LOGGED_OUT)
        .path("/")
        .http_only(true)
        .max_age(CookieDuration::seconds(10))
        .finish()
}

/// Issue a token for `user`, set the cookie and return the standard auth body
pub fn send_token(user: &User, status: StatusCode, config: &Config) -> Result<HttpResponse, AppError> {
    let token = sign_token(user.id, config)?;

    Ok(HttpResponse::build(status)
        .cookie(auth_cookie(token.clone(), config))
        .json(json!({
            "status": "success",
            "token": token,
            "data": { "user": user }
        })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::sample_user;
    use crate::models::Role;
    use actix_web::test::TestRequest;

    #[test]
    fn test_sign_and_verify() {
        let config = Config::for_tests();
        let id = Uuid::new_v4();
        let token = sign_token(id, &config).unwrap();
        let claims = verify_token(&token, &config).unwrap();

        assert_eq!(claims.id, id);
        assert_eq!(claims.exp - claims.iat, 90 * 24 * 60 * 60);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let config = Config::for_tests();
        let token = sign_token(Uuid::new_v4(), &config).unwrap();

        let mut other = Config::for_tests();
        other.jwt_secret = "another-secret-that-is-long-enough-too".to_string();
        let err = verify_token(&token, &other).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Access Denied: Invalid token. Please login again."
        );
    }

    #[test]
    fn test_expired_token_message() {
        let config = Config::for_tests();
        let past = Utc::now() - Duration::days(2);
        let claims = Claims {
            id: Uuid::new_v4(),
            iat: past.timestamp(),
            exp: (past + Duration::days(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        let err = verify_token(&token, &config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Access Denied: Expired JWT Token. Please login again!"
        );
    }

    #[test]
    fn test_token_from_header_wins_over_cookie() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer header-token"))
            .cookie(Cookie::new(AUTH_COOKIE, "cookie-token"))
            .to_http_request();
        assert_eq!(token_from_request(&req).as_deref(), Some("header-token"));

        let req = TestRequest::default()
            .cookie(Cookie::new(AUTH_COOKIE, "cookie-token"))
            .to_http_request();
        assert_eq!(token_from_request(&req).as_deref(), Some("cookie-token"));
    }

    #[test]
    fn test_logged_out_cookie_is_no_token() {
        let req = TestRequest::default()
            .cookie(Cookie::new(AUTH_COOKIE, LOGGED_OUT))
            .to_http_request();
        assert!(token_from_request(&req).is_none());
    }

    #[test]
    fn test_send_token_sets_cookie() {
        let config = Config::for_tests();
        let user = sample_user(Role::User);
        let resp = send_token(&user, StatusCode::CREATED, &config).unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        let cookie = resp.cookies().find(|c| c.name() == AUTH_COOKIE).unwrap();
        assert_eq!(cookie.http_only(), Some(true));
        assert!(verify_token(cookie.value(), &config).is_ok());
    }
}
