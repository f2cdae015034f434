use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unrecognized capture format: {0}")]
    Format(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("match service error: {0}")]
    MatchService(String),
    #[error("io error: {0}")]
    Io(String),
}

impl CoreError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn match_service(message: impl Into<String>) -> Self {
        Self::MatchService(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }
}
