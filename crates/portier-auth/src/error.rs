//! Error types for authentication adapters.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors an adapter may surface to the approval flow.
///
/// "Not authenticated" is never an error; adapters report it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Network/HTTP error talking to the identity backend.
    #[error("Network error: {0}")]
    Network(String),

    /// Identity backend returned something unusable.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Stored session data could not be decoded.
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// Adapter misconfiguration.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Network(e.to_string())
    }
}
