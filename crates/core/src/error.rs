use thiserror::Error;

pub type ChurnResult<T> = Result<T, ChurnError>;

#[derive(Error, Debug)]
pub enum ChurnError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Computation cancelled")]
    Cancelled,

    #[error("Interval source error: {0}")]
    Source(anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChurnError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<config::ConfigError> for ChurnError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ChurnError::invalid("window end must be after start").to_string(),
            "Invalid argument: window end must be after start"
        );
        assert_eq!(ChurnError::Cancelled.to_string(), "Computation cancelled");
    }

    #[test]
    fn test_source_error_keeps_cause() {
        let err = ChurnError::Source(anyhow::anyhow!("database unavailable"));
        assert!(err.to_string().contains("database unavailable"));
    }
}
