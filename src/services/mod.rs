// src/services/mod.rs
// DOCUMENTATION: Services module organization
// PURPOSE: Re-export service components

pub mod auth_service;
pub mod email;
pub mod payment;
pub mod rate_limit;

pub use auth_service::*;
pub use email::*;
pub use payment::*;
pub use rate_limit::*;
