// src/bin/import_dev_data.rs
// DOCUMENTATION: Development seed importer
// PURPOSE: Load tours, users and reviews from JSON fixtures, or wipe them
//
// Usage:
//   cargo run --bin import-dev-data -- --import
//   cargo run --bin import-dev-data -- --delete

use anyhow::{bail, Context, Result};
use clap::Parser;
use dotenv::dotenv;
use natours::auth::password::hash_password;
use natours::config::{init_db_pool, Config};
use natours::db::{ReviewRepository, TourRepository, UserRepository};
use natours::models::{CreateTourRequest, Role};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use validator::Validate;

#[derive(Parser, Debug)]
#[command(author, version, about = "Import or delete the development data set")]
struct Args {
    /// Insert every fixture
    #[arg(long, conflicts_with = "delete")]
    import: bool,

    /// Remove all tours, users, reviews and bookings
    #[arg(long)]
    delete: bool,

    /// Directory holding tours.json, users.json and reviews.json
    #[arg(long, default_value = "dev-data/data")]
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SeedTour {
    id: Uuid,
    #[serde(flatten)]
    tour: CreateTourRequest,
}

#[derive(Debug, Deserialize)]
struct SeedUser {
    id: Uuid,
    name: String,
    email: String,
    password: String,
    #[serde(default = "default_role")]
    role: Role,
    #[serde(default)]
    photo: Option<String>,
}

fn default_role() -> Role {
    Role::User
}

#[derive(Debug, Deserialize)]
struct SeedReview {
    id: Uuid,
    review: String,
    rating: f64,
    tour: Uuid,
    user: Uuid,
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>> {
    let path = dir.join(file);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

async fn import_data(pool: &PgPool, dir: &Path) -> Result<()> {
    let tours: Vec<SeedTour> = read_json(dir, "tours.json")?;
    let users: Vec<SeedUser> = read_json(dir, "users.json")?;
    let reviews: Vec<SeedReview> = read_json(dir, "reviews.json")?;

    // Guides referenced by tours must exist first
    for user in &users {
        let hash = hash_password(user.password.clone()).await?;
        UserRepository::insert(
            pool,
            Some(user.id),
            &user.name,
            &user.email,
            &hash,
            user.role,
            user.photo.as_deref(),
        )
        .await
        .with_context(|| format!("user {}", user.email))?;
    }
    println!("Imported {} users", users.len());

    for seed in tours {
        let tour = seed.tour.normalize();
        tour.validate()
            .with_context(|| format!("tour '{}' is invalid", tour.name))?;
        TourRepository::insert(pool, Some(seed.id), &tour)
            .await
            .with_context(|| format!("tour '{}'", tour.name))?;
    }
    println!("Imported tours");

    for review in &reviews {
        ReviewRepository::insert(
            pool,
            Some(review.id),
            &review.review,
            review.rating,
            review.tour,
            review.user,
        )
        .await
        .with_context(|| format!("review {}", review.id))?;
    }
    println!("Imported {} reviews", reviews.len());

    Ok(())
}

async fn delete_data(pool: &PgPool) -> Result<()> {
    // Reviews and bookings cascade from tours and users
    let reviews = ReviewRepository::delete_all(pool).await?;
    let tours = TourRepository::delete_all(pool).await?;
    let users = UserRepository::delete_all(pool).await?;
    println!(
        "Deleted {} reviews, {} tours, {} users",
        reviews, tours, users
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    if !args.import && !args.delete {
        bail!("pass either --import or --delete");
    }

    let config = Config::from_env();
    let pool = init_db_pool(&config)
        .await
        .context("failed to connect to database")?;

    if args.import {
        import_data(&pool, &args.dir).await?;
        println!("Import operation successful!");
    } else {
        delete_data(&pool).await?;
        println!("Delete operation successful!");
    }

    Ok(())
}
