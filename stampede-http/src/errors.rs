//! Transport errors
//!
//! A response with any status code is not an error here; only failures to
//! obtain a response are. Status handling belongs to the classifier.

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Unsupported HTTP method '{0}' (expected GET, POST, PUT, PATCH or DELETE)")]
    InvalidMethod(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Cannot build HTTP client: {0}")]
    ConfigError(String),

    #[error("No scripted response for {0}")]
    Unmatched(String),
}

impl HttpError {
    /// Whether the request was abandoned because the client timeout fired
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout(_))
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            HttpError::Timeout(error.to_string())
        } else {
            HttpError::NetworkError(error.to_string())
        }
    }
}
