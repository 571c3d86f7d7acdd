// src/auth/extractors.rs
// DOCUMENTATION: Request extractors for authenticated routes
// PURPOSE: `CurrentUser` guards API routes, `MaybeUser` personalizes rendered pages

use crate::auth::jwt::{cookie_token, token_from_request, verify_token};
use crate::config::Config;
use crate::db::UserRepository;
use crate::errors::AppError;
use crate::models::{Role, User};
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use sqlx::PgPool;
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;

/// The authenticated, still-active user behind the request token
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// 403 unless the user holds one of `roles`
    pub fn restrict_to(&self, roles: &[Role]) -> Result<(), AppError> {
        if self.0.has_role(roles) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ))
        }
    }

    pub fn into_inner(self) -> User {
        self.0
    }
}

impl Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let token = token_from_request(&req).ok_or_else(|| {
                AppError::Unauthorized(
                    "You are not logged in! Please log in to get access.".to_string(),
                )
            })?;
            authenticate(&req, &token).await.map(CurrentUser)
        })
    }
}

/// Logged-in user for rendered pages; any failure means anonymous
#[derive(Debug, Clone, Default)]
pub struct MaybeUser(pub Option<User>);

impl FromRequest for MaybeUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let Some(token) = cookie_token(&req) else {
                return Ok(MaybeUser(None));
            };
            match authenticate(&req, &token).await {
                Ok(user) => Ok(MaybeUser(Some(user))),
                Err(e) => {
                    log::debug!("Ignoring session cookie: {}", e);
                    Ok(MaybeUser(None))
                }
            }
        })
    }
}

async fn authenticate(req: &HttpRequest, token: &str) -> Result<User, AppError> {
    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| AppError::InternalError("Config not registered".to_string()))?;
    let claims = verify_token(token, config)?;

    let pool = req
        .app_data::<web::Data<PgPool>>()
        .ok_or_else(|| AppError::InternalError("Database pool not registered".to_string()))?;

    let user = UserRepository::find_by_id(pool, claims.id)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized(
                "The user belonging to this token does no longer exist.".to_string(),
            )
        })?;

    if user.changed_password_after(claims.iat) {
        return Err(AppError::Unauthorized(
            "User recently changed password! Please log in again.".to_string(),
        ));
    }

    Ok(user)
}
