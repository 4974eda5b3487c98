//! Domain error types.

use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Request data is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The caller's credential is missing or invalid.
    #[error("{0}")]
    Unauthenticated(String),

    /// Email/password pair did not match.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The referenced record does not exist.
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness rule was violated.
    #[error("{0}")]
    Conflict(String),

    /// Checkout was attempted without any cart lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Hashing or token signing failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            StoreError::Conflict { field } => {
                DomainError::Conflict(format!("{} already exists", capitalize(field)))
            }
            StoreError::OutOfRange { field } => {
                DomainError::Validation(format!("{} out of range", capitalize(field)))
            }
            other => DomainError::Store(other),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
