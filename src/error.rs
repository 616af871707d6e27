//! Error types for the memoization layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for memoization and storage operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Call arguments do not fit the declared signature
    #[error("Arity error: {0}")]
    Arity(String),

    /// A value could not be converted to or from its stored form
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The network store could not be reached when the backend was built
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A storage command failed after the backend was built
    #[error("Backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// Configuration could not be turned into a usable backend
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for the memoization layer.
pub type Result<T> = std::result::Result<T, CacheError>;
