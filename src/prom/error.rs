use thiserror::Error;

/// Failure of a single instant query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The backend answered with a non-success status. Carries the backend's
    /// own `error` payload untouched.
    #[error("{0}")]
    Backend(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("proxy requested but no proxy base url is configured")]
    MissingProxyBase,
}

impl QueryError {
    /// The backend-provided message, if the backend rejected the query.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            QueryError::Backend(message) => Some(message),
            _ => None,
        }
    }
}
