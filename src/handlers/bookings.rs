// src/handlers/bookings.rs
// DOCUMENTATION: HTTP handlers for bookings and Stripe checkout
// PURPOSE: Checkout sessions, the payment webhook and staff booking management

use crate::auth::CurrentUser;
use crate::db::{BookingRepository, Scope, TourRepository, UserRepository};
use crate::errors::AppError;
use crate::handlers::factory;
use crate::models::{Booking, CreateBookingRequest, Role, UpdateBookingRequest};
use crate::services::{CheckoutSession, StripeClient};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

const BOOKING_READERS: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];
const BOOKING_WRITERS: &[Role] = &[Role::Admin];

/// GET /bookings/checkout-session/{tour_id}
pub async fn checkout_session(
    pool: web::Data<PgPool>,
    stripe: web::Data<StripeClient>,
    user: CurrentUser,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let tour = TourRepository::find_by_id(&pool, path.into_inner())
        .await?
        .ok_or_else(AppError::not_found)?;

    let session = stripe
        .create_checkout_session(&tour, &user, &factory::site_url(&req))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "session": { "id": session.id, "url": session.url }
    })))
}

/// Record the booking paid for in a completed checkout
async fn create_booking_checkout(pool: &PgPool, session: &CheckoutSession) -> Result<(), AppError> {
    let tour_id = session
        .tour_id()
        .ok_or_else(|| AppError::BadRequest("Webhook error: missing client_reference_id".into()))?;
    let email = session
        .email()
        .ok_or_else(|| AppError::BadRequest("Webhook error: missing customer email".into()))?;
    let price = session
        .price()
        .ok_or_else(|| AppError::BadRequest("Webhook error: missing amount_total".into()))?;

    let user = UserRepository::find_by_email(pool, email)
        .await?
        .ok_or_else(|| {
            log::warn!("Checkout {} completed for unknown customer {}", session.id, email);
            AppError::BadRequest(format!("Webhook error: no user with email {}", email))
        })?;

    let booking = CreateBookingRequest {
        tour: tour_id,
        user: user.id,
        price,
        paid: Some(true),
    };
    BookingRepository::insert(pool, &booking).await?;
    Ok(())
}

/// POST /bookings/webhook-checkout
/// Body must be the raw bytes Stripe signed
pub async fn webhook_checkout(
    pool: web::Data<PgPool>,
    stripe: web::Data<StripeClient>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Webhook error: missing Stripe-Signature".into()))?;

    let event = stripe.verify_webhook(&body, signature, Utc::now().timestamp())?;
    log::info!("Stripe event {:?} ({})", event.id, event.kind);

    if event.kind == "checkout.session.completed" {
        let session: CheckoutSession = serde_json::from_value(event.data.object)
            .map_err(|e| AppError::BadRequest(format!("Webhook error: {}", e)))?;
        create_booking_checkout(&pool, &session).await?;
    }

    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}

/// GET /bookings
pub async fn get_all_bookings(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(BOOKING_READERS)?;
    let pairs = factory::query_pairs(&req)?;
    factory::get_all::<Booking>(&pool, Scope::default(), &pairs).await
}

/// GET /bookings/{id}
pub async fn get_booking(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(BOOKING_READERS)?;
    factory::get_one::<Booking>(&pool, path.into_inner()).await
}

/// POST /bookings
pub async fn create_booking(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    body: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(BOOKING_WRITERS)?;
    factory::create_one::<Booking>(&pool, body.into_inner()).await
}

/// PATCH /bookings/{id}
pub async fn update_booking(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateBookingRequest>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(BOOKING_WRITERS)?;
    factory::update_one::<Booking>(&pool, path.into_inner(), body.into_inner()).await
}

/// DELETE /bookings/{id}
pub async fn delete_booking(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    user.restrict_to(BOOKING_WRITERS)?;
    factory::delete_one::<Booking>(&pool, path.into_inner()).await
}

/// Configuration for booking routes (mounted under /api/v1)
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookings")
            .route("/checkout-session/{tour_id}", web::get().to(checkout_session))
            .route("/webhook-checkout", web::post().to(webhook_checkout))
            .route("", web::get().to(get_all_bookings))
            .route("", web::post().to(create_booking))
            .route("/{id}", web::get().to(get_booking))
            .route("/{id}", web::patch().to(update_booking))
            .route("/{id}", web::delete().to(delete_booking)),
    );
}
