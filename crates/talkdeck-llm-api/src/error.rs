use thiserror::Error;

use talkdeck_types::error_messages;

/// Failures of a call to the AI service.
///
/// `Display` renders the message meant for the end user.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{msg}", msg = error_messages::API_KEY_ERROR)]
    InvalidApiKey,
    #[error("{msg}", msg = error_messages::RATE_LIMIT_ERROR)]
    RateLimited,
    #[error("{msg}", msg = error_messages::SERVER_ERROR)]
    Server { status: u16 },
    #[error("API error: {message}")]
    Provider { status: u16, message: String },
    #[error("{msg}", msg = error_messages::TIMEOUT_ERROR)]
    Timeout(#[source] reqwest::Error),
    #[error("{msg}", msg = error_messages::CONNECTION_FAILED)]
    Connection(#[source] reqwest::Error),
    #[error("{msg}", msg = error_messages::NETWORK_ERROR)]
    Network(#[source] reqwest::Error),
    #[error("Unexpected response from the AI service: {0}")]
    InvalidResponse(String),
    #[error("{msg}", msg = error_messages::REQUEST_CANCELLED)]
    Cancelled,
    #[error("{msg}", msg = error_messages::UNKNOWN_ERROR)]
    Unknown(#[source] reqwest::Error),
}

/// Stands in for a missing `error.message` in provider error bodies
const MISSING_PROVIDER_MESSAGE: &str = "unknown error";

impl ApiError {
    /// Map a non-success HTTP status (and its body) to an error
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => ApiError::InvalidApiKey,
            429 => ApiError::RateLimited,
            500..=599 => ApiError::Server { status },
            _ => ApiError::Provider {
                status,
                message: provider_error_message(body).unwrap_or_else(|| MISSING_PROVIDER_MESSAGE.to_string()),
            },
        }
    }

    /// The message to show the user
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// HTTP status behind this error, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::InvalidApiKey => Some(401),
            ApiError::RateLimited => Some(429),
            ApiError::Server { status } | ApiError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout(e)
        } else if e.is_connect() {
            ApiError::Connection(e)
        } else if e.is_decode() {
            ApiError::InvalidResponse(e.to_string())
        } else if e.is_request() || e.is_body() {
            ApiError::Network(e)
        } else {
            ApiError::Unknown(e)
        }
    }
}

/// `error.message` of an OpenAI-style error body
fn provider_error_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json["error"]["message"]
        .as_str()
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
