// src/auth/mod.rs
// DOCUMENTATION: Authentication module organization
// PURPOSE: Re-export token, password and extractor helpers

pub mod extractors;
pub mod jwt;
pub mod password;

pub use extractors::{CurrentUser, MaybeUser};
pub use jwt::{logout_cookie, send_token, sign_token, verify_token, Claims};
