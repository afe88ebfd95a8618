use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// A segment file failed validation (header, footer, checksum, codec tag).
    /// Fatal for the containing segment; the engine refuses to open it.
    #[error("Segment format error in {file}: {reason}")]
    Format { file: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    /// A query constraint that cannot be satisfied, e.g. requesting the
    /// non-empty variant of a clause that only matches the empty sequence.
    #[error("Query error: {0}")]
    Query(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Unknown sensitivity suffix: {0}")]
    UnknownSensitivity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Search cancelled")]
    Cancelled,
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn format(file: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Format {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error means the whole segment must be rejected
    pub fn is_segment_fatal(&self) -> bool {
        matches!(self, EngineError::Format { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::format("_0.terms", "checksum mismatch");
        assert_eq!(
            err.to_string(),
            "Segment format error in _0.terms: checksum mismatch"
        );
    }

    #[test]
    fn test_segment_fatal() {
        assert!(EngineError::format("_0.tokens", "bad tag").is_segment_fatal());
        assert!(!EngineError::Cancelled.is_segment_fatal());
        assert!(!EngineError::Query("bad".into()).is_segment_fatal());
    }
}
