/// Result alias that carries the custom [`AuroralError`] type.
pub type Result<T> = std::result::Result<T, AuroralError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum AuroralError {
    /// A frame or snapshot carried the wrong number of entries for the
    /// configured light count. Always reported to the caller; frames are
    /// never truncated or padded to fit.
    #[error("size mismatch: got {actual} lights, expected {expected}")]
    SizeMismatch { actual: usize, expected: usize },
    /// Device configuration that cannot produce a working pipeline, e.g. a
    /// zero light count. Fatal at setup time.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// The hardware behind an output backend is not present or not
    /// responding. Recoverable: callers may retry or fall back to a
    /// lower-priority backend.
    #[error("output backend `{identifier}` is unavailable")]
    BackendUnavailable { identifier: String },
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl AuroralError {
    /// Creates an [`AuroralError::InvalidConfiguration`] from any message.
    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
