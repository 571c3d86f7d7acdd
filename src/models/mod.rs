// src/models/mod.rs
// DOCUMENTATION: Models module organization
// PURPOSE: Re-export model components

pub mod booking;
pub mod review;
pub mod tour;
pub mod user;

pub use booking::*;
pub use review::*;
pub use tour::*;
pub use user::*;
