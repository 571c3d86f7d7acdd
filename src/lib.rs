// src/lib.rs
// DOCUMENTATION: Library root
// PURPOSE: Expose the application modules to the server binary, the seed importer and tests

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
