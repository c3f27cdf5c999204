use thiserror::Error;

/// Client-level error type.
/// Every service call returns `Result<T, ClientError>`; callers show `message()` to the user.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unauthorized")]
    Unauthorized { message: Option<String> },

    #[error("Session expired")]
    SessionExpired,

    #[error("Payment required (status {status})")]
    PaymentRequired { status: u16, message: Option<String> },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Resume parsing failed: {0}")]
    ParseFailed(String),

    #[error("Resume parsing timed out")]
    Timeout,

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ClientError {
    /// Human-readable text for a toast. Server messages pass through untouched.
    pub fn message(&self) -> String {
        match self {
            ClientError::Validation(msg) => msg.clone(),
            ClientError::Api { message, .. } => message.clone(),
            ClientError::Unauthorized { message } => message
                .clone()
                .unwrap_or_else(|| "Please log in to continue".to_string()),
            ClientError::SessionExpired => "Your session has expired. Please log in again".to_string(),
            ClientError::PaymentRequired { message, .. } => message.clone().unwrap_or_else(|| {
                "An active subscription is required to access this feature".to_string()
            }),
            ClientError::Http(e) if e.is_timeout() => "The request timed out".to_string(),
            ClientError::Http(_) => "Network error. Please check your connection".to_string(),
            ClientError::Parse(_) => "Received an unexpected response from the server".to_string(),
            ClientError::ParseFailed(msg) => msg.clone(),
            ClientError::Timeout => {
                "Resume parsing is taking longer than expected. Please try again later".to_string()
            }
            ClientError::Storage(_) => "Could not access local storage".to_string(),
        }
    }

    /// HTTP status carried by the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } | ClientError::PaymentRequired { status, .. } => {
                Some(*status)
            }
            ClientError::Unauthorized { .. } | ClientError::SessionExpired => Some(401),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True for 401-class failures that should end the session.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ClientError::Unauthorized { .. } | ClientError::SessionExpired
        )
    }
}
