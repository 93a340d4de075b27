use thiserror::Error;

pub use anyhow::Context;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
    #[error("authentication rejected: {0}")]
    Authentication(String),
    #[error("client is not authenticated")]
    NotAuthenticated,
    #[error("response body is missing expected key `{0}`")]
    ResponseShape(String),
    #[error("no exact match was found for ticker {0}")]
    NoExactMatch(String),
    #[error("insufficient data: requested {requested} periods, only {available} available")]
    InsufficientData { requested: usize, available: usize },
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    pub fn message<T: Into<String>>(msg: T) -> Self {
        ClientError::Message(msg.into())
    }
}
