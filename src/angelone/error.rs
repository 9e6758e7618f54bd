//! Angel One error types

use thiserror::Error;

use crate::scanner::FetchError;

#[derive(Debug, Error)]
pub enum AngelOneError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Session not connected")]
    NotConnected,
}

impl From<reqwest::Error> for AngelOneError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<AngelOneError> for FetchError {
    fn from(err: AngelOneError) -> Self {
        match err {
            AngelOneError::Network(msg) => FetchError::Transport(msg),
            AngelOneError::Parse(msg) => FetchError::Malformed(msg),
            AngelOneError::Api(msg) | AngelOneError::Auth(msg) => FetchError::Api(msg),
            AngelOneError::NotConnected => FetchError::NotConnected,
        }
    }
}

pub type AngelOneResult<T> = Result<T, AngelOneError>;
