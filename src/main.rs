// src/main.rs
// DOCUMENTATION: Application entry point
// PURPOSE: Initialize config, database, mail/payment clients and start HTTP server

use actix_web::middleware::{Compress, DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use natours::config::{self, Config};
use natours::errors::set_expose_details;
use natours::handlers;
use natours::services::{ApiRateLimiter, Mailer, StripeClient};
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // 1. Load environment variables
    dotenv().ok();

    // 2. Load configuration
    let config = Config::from_env();

    // 3. Initialize logging
    if std::env::var("RUST_LOG").is_err() {
        let log_level = if !config.log_level.is_empty() {
            config.log_level.clone()
        } else {
            "info,actix_web=info,sqlx=warn".to_string()
        };
        std::env::set_var("RUST_LOG", log_level);
    }
    env_logger::init();

    if let Err(e) = config.validate() {
        log::error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    set_expose_details(!config.is_production());

    log::info!("Starting natours...");
    log::info!("Environment: {}", config.environment);
    log::info!(
        "Server Address: {}:{}",
        config.server_address,
        config.server_port
    );

    // 4. Initialize database connection pool
    let pool = match config::init_db_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    // 5. Outbound services
    let mailer = match Mailer::from_config(&config) {
        Ok(mailer) => web::Data::new(mailer),
        Err(e) => {
            log::error!("Failed to configure mailer: {}", e);
            std::process::exit(1);
        }
    };
    let stripe = web::Data::new(StripeClient::new(
        config.stripe_secret_key.clone(),
        config.stripe_webhook_secret.clone(),
    ));

    // One limiter for all workers so the hourly quota is per process
    let limiter = web::Data::new(ApiRateLimiter::per_hour(config.rate_limit_max));
    log::info!("API rate limit: {} requests/hour per IP", config.rate_limit_max);

    // 6. Start HTTP server
    let server_addr = format!("{}:{}", config.server_address, config.server_port);
    let pool = web::Data::new(pool);
    let config = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            // Application state
            .app_data(pool.clone())
            .app_data(config.clone())
            .app_data(mailer.clone())
            .app_data(stripe.clone())
            .app_data(limiter.clone())
            // Middleware
            .wrap(Logger::default())
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
                    .add(("X-XSS-Protection", "0")),
            )
            // Routes
            .configure(handlers::configure)
    })
    .bind(&server_addr)?
    .run()
    .await
}
