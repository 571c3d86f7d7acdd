// src/auth/password.rs
// DOCUMENTATION: Password hashing and reset tokens
// PURPOSE: bcrypt work runs on the blocking pool so it never stalls a worker

use crate::errors::AppError;
use rand::RngCore;
use sha2::{Digest, Sha256};

const BCRYPT_COST: u32 = 12;

/// Reset tokens stay valid for this many minutes
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

pub async fn hash_password(plain: String) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(plain, BCRYPT_COST))
        .await
        .map_err(|e| AppError::InternalError(format!("Hashing task failed: {}", e)))??;
    Ok(hash)
}

pub async fn verify_password(plain: String, hash: String) -> Result<bool, AppError> {
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash))
        .await
        .map_err(|e| AppError::InternalError(format!("Verification task failed: {}", e)))??;
    Ok(matches)
}

/// Returns (plain token for the email, sha256 hex stored in the database)
pub fn create_reset_token() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let plain = hex::encode(bytes);
    let hashed = hash_reset_token(&plain);
    (plain, hashed)
}

pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("pass1234".to_string()).await.unwrap();
        assert_ne!(hash, "pass1234");
        assert!(verify_password("pass1234".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong-pass".to_string(), hash).await.unwrap());
    }

    #[test]
    fn test_reset_token_pair() {
        let (plain, hashed) = create_reset_token();
        assert_eq!(plain.len(), 64);
        assert_eq!(hashed.len(), 64);
        assert_ne!(plain, hashed);
        assert_eq!(hash_reset_token(&plain), hashed);

        let (other, _) = create_reset_token();
        assert_ne!(plain, other);
    }
}
