use serde_json::Value;
use synthid_types::ValidationError;
use thiserror::Error;

/// Every failure the operator can see. Display is the user-facing message.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed (connection refused, DNS, reset).
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx response; `message` comes from the backend envelope when present.
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
    /// Rejected before any request was sent.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

/// Pull `error.message` out of a failed response body.
pub fn envelope_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("request failed ({status})"))
}
