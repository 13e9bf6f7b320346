/// Result alias that carries the custom [`SyncError`] type.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Common error type for the core crate.
///
/// Gesture handling never produces one of these: out-of-range pointer input is
/// clamped. Errors only surface from construction, loading and decoding.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A value supplied by the caller cannot be used to build the requested
    /// state.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed analysis or configuration document.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// Audio bytes could not be retrieved from their source.
    #[error("fetch failed for `{url}`: {reason}")]
    Fetch { url: String, reason: String },
    /// Audio bytes were retrieved but could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),
}

impl SyncError {
    pub(crate) fn fetch(url: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<symphonia::core::errors::Error> for SyncError {
    fn from(value: symphonia::core::errors::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
