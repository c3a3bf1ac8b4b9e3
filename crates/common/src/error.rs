/// vecbulk error types
#[derive(Debug, thiserror::Error)]
pub enum VecBulkError {
    /// Count, dimension, names or policies out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A sampled vector had zero norm and could not be normalized
    #[error("Division by zero: {0}")]
    DivideByZero(String),

    /// A vector component could not be encoded (NaN/Infinity)
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bulk payload failed verification
    #[error("Verification failed: {0}")]
    Verification(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General error (anyhow integration)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VecBulkError {
    /// Create invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create divide-by-zero error
    pub fn divide_by_zero<S: Into<String>>(msg: S) -> Self {
        Self::DivideByZero(msg.into())
    }

    /// Create serialization error
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create verification error
    pub fn verification<S: Into<String>>(msg: S) -> Self {
        Self::Verification(msg.into())
    }
}

impl From<::config::ConfigError> for VecBulkError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

// Process exit status for the CLI
impl VecBulkError {
    /// Get process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => 2,
            Self::Config(_) => 3,
            Self::DivideByZero(_) => 4,
            Self::Serialization(_) => 4,
            Self::Json(_) => 4,
            Self::Verification(_) => 5,
            Self::Io(_) => 74,
            Self::Other(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_message() {
        let err = VecBulkError::invalid_argument("count must be at least 1");
        assert_eq!(err.to_string(), "Invalid argument: count must be at least 1");

        let err = VecBulkError::divide_by_zero("vector 7 has zero norm");
        assert_eq!(err.to_string(), "Division by zero: vector 7 has zero norm");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(VecBulkError::invalid_argument("x").exit_code(), 2);
        assert_eq!(VecBulkError::verification("x").exit_code(), 5);

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(VecBulkError::from(io).exit_code(), 74);
    }

    #[test]
    fn test_from_config_error() {
        let err: VecBulkError = ::config::ConfigError::NotFound("doc_count".to_string()).into();
        assert!(matches!(err, VecBulkError::Config(_)));
    }
}
