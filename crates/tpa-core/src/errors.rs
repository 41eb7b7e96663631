use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

/// Failures of the read side. A missing run is its own outcome so callers can
/// answer "not found" instead of a generic failure.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("run not found: {0}")]
    NotFound(i64),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl QueryError {
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::NotFound(_) => "E_NOT_FOUND",
            QueryError::Storage(_) => "E_INTERNAL",
        }
    }
}
