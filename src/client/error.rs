use std::time::Duration;

use thiserror::Error;

/// Categorised failure of a detection API call.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("cannot reach the detection server at {url}: check your connection and that the API is running")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("your session has expired or the token is invalid: please log in again")]
    Unauthorized,
    #[error("the image is too large for the detection server: upload a smaller file")]
    PayloadTooLarge,
    #[error("the detection server failed to process the image (HTTP {status}): try again later")]
    Server { status: u16, detail: Option<String> },
    #[error("detection timed out: the server did not respond within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("detection request was refused (HTTP {status}){}", detail_suffix(.detail))]
    Http { status: u16, detail: Option<String> },
    #[error("the detection server returned an unusable response: {0}")]
    InvalidResponse(String),
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) if !d.is_empty() => format!(": {d}"),
        _ => String::new(),
    }
}

impl DetectError {
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        match status {
            401 => DetectError::Unauthorized,
            413 => DetectError::PayloadTooLarge,
            500..=599 => DetectError::Server { status, detail },
            _ => DetectError::Http { status, detail },
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, DetectError::Unauthorized)
    }

    /// Short machine-readable category name.
    pub fn kind(&self) -> &'static str {
        match self {
            DetectError::Network { .. } => "network",
            DetectError::Unauthorized => "unauthorized",
            DetectError::PayloadTooLarge => "payload_too_large",
            DetectError::Server { .. } => "server",
            DetectError::Timeout(_) => "timeout",
            DetectError::Http { .. } => "http",
            DetectError::InvalidResponse(_) => "invalid_response",
            DetectError::InvalidImage(_) => "invalid_image",
        }
    }
}

/// Pulls FastAPI's `{"detail": "..."}` out of an error body.
pub fn parse_detail(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    match v.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
