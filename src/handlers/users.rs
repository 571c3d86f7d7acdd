// src/handlers/users.rs
// DOCUMENTATION: HTTP handlers for authentication and user accounts
// PURPOSE: Public auth flows, self-service profile routes and admin user management

use crate::auth::{logout_cookie, send_token, CurrentUser};
use crate::config::Config;
use crate::db::{Scope, UserRepository};
use crate::errors::AppError;
use crate::handlers::factory;
use crate::models::{
    ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, Role, SignupRequest,
    UpdateMeRequest, UpdatePasswordRequest, UpdateUserRequest, User,
};
use crate::services::{AuthService, Mailer};
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// POST /users/signup
pub async fn signup(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    mailer: web::Data<Mailer>,
    req: HttpRequest,
    body: web::Json<SignupRequest>,
) -> Result<HttpResponse, AppError> {
    let site_url = factory::site_url(&req);
    let user = AuthService::signup(&pool, &mailer, body.into_inner(), &site_url).await?;
    send_token(&user, StatusCode::CREATED, &config)
}

/// POST /users/login
pub async fn login(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let user = AuthService::login(&pool, body.into_inner()).await?;
    send_token(&user, StatusCode::OK, &config)
}

/// GET /users/logout
pub async fn logout() -> HttpResponse {
    HttpResponse::Ok()
        .cookie(logout_cookie())
        .json(json!({ "status": "success" }))
}

/// POST /users/forgotPassword
pub async fn forgot_password(
    pool: web::Data<PgPool>,
    mailer: web::Data<Mailer>,
    req: HttpRequest,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let site_url = factory::site_url(&req);
    AuthService::forgot_password(&pool, &mailer, &body.email, &site_url).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Token sent to email!"
    })))
}

/// PATCH /users/resetPassword/{token}
pub async fn reset_password(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    path: web::Path<String>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let user = AuthService::reset_password(&pool, &path.into_inner(), body.into_inner()).await?;
    send_token(&user, StatusCode::OK, &config)
}

/// PATCH /users/updateMyPassword
pub async fn update_my_password(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    user: CurrentUser,
    body: web::Json<UpdatePasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let user = AuthService::update_password(&pool, &user, body.into_inner()).await?;
    send_token(&user, StatusCode::OK, &config)
}

/// GET /users/me
pub async fn get_me(
    pool: web::Data<PgPool>,
    user: CurrentUser,
) -> Result<HttpResponse, AppError> {
    factory::get_one::<User>(&pool, user.id).await
}

/// PATCH /users/updateMe
/// Only name and email can change here
pub async fn update_me(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    body: web::Json<UpdateMeRequest>,
) -> Result<HttpResponse, AppError> {
    let input = body.into_inner();
    if input.touches_password() {
        return Err(AppError::BadRequest(
            "This route is not for password updates. Please use /updateMyPassword.".to_string(),
        ));
    }

    let input = input.normalize();
    input.validate()?;
    let updated =
        UserRepository::update_profile(&pool, user.id, input.name.as_deref(), input.email.as_deref())
            .await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "user": updated }
    })))
}

/// DELETE /users/deleteMe
pub async fn delete_me(
    pool: web::Data<PgPool>,
    user: CurrentUser,
) -> Result<HttpResponse, AppError> {
    UserRepository::deactivate(&pool, user.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /users (admin)
pub async fn get_all_users(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(&[Role::Admin])?;
    let pairs = factory::query_pairs(&req)?;
    factory::get_all::<User>(&pool, Scope::default(), &pairs).await
}

/// POST /users (admin)
pub async fn create_user(user: CurrentUser) -> Result<HttpResponse, AppError> {
    user.restrict_to(&[Role::Admin])?;
    Err(AppError::ServiceFailure(
        "This route is not defined! Please use /signup instead".to_string(),
    ))
}

/// GET /users/{id} (admin)
pub async fn get_user(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(&[Role::Admin])?;
    factory::get_one::<User>(&pool, path.into_inner()).await
}

/// PATCH /users/{id} (admin). Passwords are not updated here.
pub async fn update_user(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(&[Role::Admin])?;
    factory::update_one::<User>(&pool, path.into_inner(), body.into_inner()).await
}

/// DELETE /users/{id} (admin)
pub async fn delete_user(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(&[Role::Admin])?;
    factory::delete_one::<User>(&pool, path.into_inner()).await
}

/// Configuration for user routes (mounted under /api/v1)
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("/signup", web::post().to(signup))
            .route("/login", web::post().to(login))
            .route("/logout", web::get().to(logout))
            .route("/forgotPassword", web::post().to(forgot_password))
            .route("/resetPassword/{token}", web::patch().to(reset_password))
            .route("/updateMyPassword", web::patch().to(update_my_password))
            .route("/me", web::get().to(get_me))
            .route("/updateMe", web::patch().to(update_me))
            .route("/deleteMe", web::delete().to(delete_me))
            .route("", web::get().to(get_all_users))
            .route("", web::post().to(create_user))
            .route("/{id}", web::get().to(get_user))
            .route("/{id}", web::patch().to(update_user))
            .route("/{id}", web::delete().to(delete_user)),
    );
}
