use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::{
    lifecycle::LifecycleError, payment::PaymentError, store::StoreError, types::QueueSignal,
};

/// User-facing error taxonomy. Every surfaced failure maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Server,
    Timeout,
    Validation,
    Payment,
    /// HTTP 404
    NotFound,
    /// HTTP 422
    InvalidInput,
    /// HTTP 503, treated as a queue signal rather than a failure
    Capacity,
    Cancelled,
    General,
}

impl ErrorKind {
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Network => {
                "We're having trouble connecting to our servers. Please check your internet connection and try again."
            }
            ErrorKind::Server => "Our servers are currently busy. Please try again in a few moments.",
            ErrorKind::Timeout => "Your request is taking longer than expected. Please try again.",
            ErrorKind::Validation => "Please ensure your text is between 5 and 50 words.",
            ErrorKind::Payment => {
                "We encountered an issue processing your payment. Please try again."
            }
            ErrorKind::NotFound => {
                "We couldn't find your request. Please try generating a new video."
            }
            ErrorKind::InvalidInput => "Please check your input and try again.",
            ErrorKind::Capacity => {
                "Our servers are currently at capacity. Your request has been queued."
            }
            ErrorKind::Cancelled => "Video generation was cancelled.",
            ErrorKind::General => "We encountered an unexpected issue. Please try again.",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Server => "server",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Validation => "validation",
            ErrorKind::Payment => "payment",
            ErrorKind::NotFound => "404",
            ErrorKind::InvalidInput => "422",
            ErrorKind::Capacity => "503",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::General => "general",
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request to {path} timed out after {timeout:?}")]
    Timeout { path: String, timeout: Duration },

    #[error("Request not found: {path}")]
    NotFound { path: String },

    #[error("HTTP error! status: 422 ({detail})")]
    InvalidInput { detail: String },

    #[error("Server at capacity (status: 503)")]
    Capacity { queue: QueueSignal },

    #[error("HTTP error! status: {status}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::InvalidInput { .. } => ErrorKind::InvalidInput,
            ApiError::Capacity { .. } => ErrorKind::Capacity,
            ApiError::Status { status, .. } if *status >= 500 => ErrorKind::Server,
            ApiError::Status { .. } => ErrorKind::General,
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Http(e) if e.is_timeout() => ErrorKind::Timeout,
            ApiError::Http(_) => ErrorKind::Network,
            ApiError::Json(_) => ErrorKind::Server,
            ApiError::Url(_) => ErrorKind::General,
        }
    }

    /// 404, 422 and 503 short-circuit the retry loop; malformed payloads and
    /// URLs would fail identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ApiError::NotFound { .. }
                | ApiError::InvalidInput { .. }
                | ApiError::Capacity { .. }
                | ApiError::Json(_)
                | ApiError::Url(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum ShortreelsError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Text must be between {min} and {max} words (got {words})")]
    Validation { words: usize, min: usize, max: usize },

    #[error("No active request")]
    NoActiveRequest,

    #[error("Unknown request {request_id}")]
    UnknownRequest { request_id: String },

    #[error("Invalid response from server: {reason}")]
    InvalidResponse { reason: String },

    #[error("Video generation failed for {request_id}: {reason}")]
    GenerationFailed { request_id: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ShortreelsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShortreelsError::Api(e) => e.kind(),
            ShortreelsError::Payment(_) => ErrorKind::Payment,
            ShortreelsError::Validation { .. } => ErrorKind::Validation,
            ShortreelsError::InvalidResponse { .. } => ErrorKind::Server,
            ShortreelsError::Lifecycle(_)
            | ShortreelsError::Store(_)
            | ShortreelsError::NoActiveRequest
            | ShortreelsError::UnknownRequest { .. }
            | ShortreelsError::GenerationFailed { .. }
            | ShortreelsError::IoError(_) => ErrorKind::General,
        }
    }

    /// Message shown to the user. Backend-provided failure reasons are passed
    /// through verbatim, everything else uses the fixed message for its kind.
    pub fn user_message(&self) -> String {
        match self {
            ShortreelsError::GenerationFailed { reason, .. } => reason.clone(),
            ShortreelsError::Payment(e) => e.user_message(),
            other => other.kind().user_message().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShortreelsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_retryable_statuses_short_circuit() {
        assert!(!ApiError::NotFound { path: "/x".into() }.is_retryable());
        assert!(!ApiError::InvalidInput { detail: String::new() }.is_retryable());
        assert!(
            !ApiError::Capacity {
                queue: QueueSignal::default()
            }
            .is_retryable()
        );
        assert!(
            ApiError::Status {
                status: 502,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(ApiError::Network("reset".into()).is_retryable());
    }

    #[test]
    fn status_codes_map_to_kinds() {
        let server = ApiError::Status {
            status: 500,
            body: String::new(),
        };
        assert_eq!(server.kind(), ErrorKind::Server);
        assert_eq!(ApiError::NotFound { path: "/".into() }.kind().code(), "404");
        assert_eq!(
            ApiError::InvalidInput { detail: "x".into() }.kind().code(),
            "422"
        );
    }

    #[test]
    fn backend_failure_reason_is_shown_verbatim() {
        let err = ShortreelsError::GenerationFailed {
            request_id: "abc".into(),
            reason: "No media found for text".into(),
        };
        assert_eq!(err.user_message(), "No media found for text");
    }
}
