use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

use crate::errors::ServiceError;

/// Argon2id PHC string with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::Infrastructure(format!("password hashing failed: {e}")))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ServiceError::Infrastructure(format!("stored password hash is invalid: {e}")))?;
    Ok(Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok())
}

/// [`hash_password`] on the blocking pool so async workers stay free.
pub async fn hash_password_blocking(plain: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| ServiceError::Infrastructure(format!("password hashing task failed: {e}")))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(plain: String, hash: String) -> Result<bool, ServiceError> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(|e| ServiceError::Infrastructure(format!("password check task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let h = hash_password("Passw0rd").unwrap();
        assert!(h.starts_with("$argon2"));
        assert!(verify_password("Passw0rd", &h).unwrap());
        assert!(!verify_password("wrong", &h).unwrap());
        assert_ne!(h, hash_password("Passw0rd").unwrap(), "salted");
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_password("x", "not-a-hash").is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn blocking_variants_agree_with_sync_ones() {
        let h = hash_password_blocking("Passw0rd".into()).await.unwrap();
        assert!(verify_password("Passw0rd", &h).unwrap());
        assert!(verify_password_blocking("Passw0rd".into(), h.clone()).await.unwrap());
        assert!(!verify_password_blocking("wrong".into(), h).await.unwrap());
    }
}
