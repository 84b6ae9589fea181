//! bcrypt hashing, run on the blocking pool so request workers stay responsive.

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("password worker failed: {0}")]
    Worker(String),
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|err| PasswordError::Worker(err.to_string()))?
        .map_err(PasswordError::from)
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|err| PasswordError::Worker(err.to_string()))?
        .map_err(PasswordError::from)
}
