// src/config/mod.rs
// DOCUMENTATION: Configuration module organization
// PURPOSE: Environment settings and the database pool

pub mod db;
pub mod env;

pub use db::{init_db_pool, ping};
pub use env::Config;
