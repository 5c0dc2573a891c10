use std::io;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("transient api error: {0}")]
    Transient(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("message is missing the `{0}` header")]
    MissingHeader(&'static str),
    #[error("{0}")]
    Locked(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("responder task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Transient(_) | AppError::RateLimited(_) => true,
            AppError::Http(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    /// Transient failures where the provider certainly did not act on the request.
    pub fn is_unsent(&self) -> bool {
        match self {
            AppError::RateLimited(_) => true,
            AppError::Http(err) => err.is_connect(),
            _ => false,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_taxonomy() {
        assert!(AppError::Transient("503".to_string()).is_transient());
        assert!(!AppError::Transient("503".to_string()).is_unsent());
        assert!(AppError::RateLimited("429".to_string()).is_unsent());
        assert!(!AppError::Api("400".to_string()).is_transient());
        assert!(!AppError::Auth("expired".to_string()).is_transient());
        assert!(AppError::Auth("expired".to_string()).is_auth());
        assert!(!AppError::MissingHeader("From").is_auth());
    }
}
