// src/handlers/health.rs
// DOCUMENTATION: Health check handler
// PURPOSE: Liveness endpoint that also reports database reachability

use crate::config::ping;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;

/// Always 200 while the process serves requests; `database` is "up" or "down"
pub async fn health_check(pool: web::Data<PgPool>) -> impl Responder {
    let database = if ping(&pool).await { "up" } else { "down" };

    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "natours",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database
    }))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}
