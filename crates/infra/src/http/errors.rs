//! Send-pipeline failure types
//!
//! Every way a dispatch can end other than a 2xx reply, as an explicit tagged
//! value callers branch on.

use erpsync_domain::impl_label_conversions;
use reqwest::{Method, StatusCode};
use thiserror::Error;

/// Failure taxonomy of the send pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendErrorCategory {
    /// 409 without the stale marker, or 503. Resent with linear backoff.
    TransientRetryable,
    /// 409 carrying the stale-etag marker on a PATCH. Resolved by the caller.
    StaleConcurrency,
    /// 401, or a token that could not be renewed
    AuthExpired,
    /// Anything else, including exhausted retry bounds
    Permanent,
    /// The caller's cancellation token fired
    Cancelled,
}

impl_label_conversions!(SendErrorCategory {
    TransientRetryable => "transient",
    StaleConcurrency => "stale_concurrency",
    AuthExpired => "auth_expired",
    Permanent => "permanent",
    Cancelled => "cancelled",
});

/// Classify a non-success response before any retry decision.
pub fn classify_status(
    status: StatusCode,
    method: &Method,
    body: &str,
    stale_marker: &str,
) -> SendErrorCategory {
    match status {
        StatusCode::UNAUTHORIZED => SendErrorCategory::AuthExpired,
        StatusCode::CONFLICT if *method == Method::PATCH && is_stale(body, stale_marker) => {
            SendErrorCategory::StaleConcurrency
        }
        StatusCode::CONFLICT | StatusCode::SERVICE_UNAVAILABLE => {
            SendErrorCategory::TransientRetryable
        }
        _ => SendErrorCategory::Permanent,
    }
}

fn is_stale(body: &str, marker: &str) -> bool {
    !marker.is_empty() && body.contains(marker)
}

/// Terminal failure of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Stale concurrency token (HTTP 409): {body}")]
    StaleConcurrency { body: String },

    #[error("HTTP {status} persisted after {retries} retries: {body}")]
    RetriesExhausted { status: u16, retries: u32, body: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response body: {0}")]
    Decode(String),

    #[error("Credential refresh failed: {0}")]
    Credential(String),

    #[error("Request could not be cloned for resend: {0}")]
    Clone(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl SendError {
    /// HTTP status of the failure. Failures without a response report 500;
    /// cancellation has no status.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::StaleConcurrency { .. } => Some(StatusCode::CONFLICT.as_u16()),
            Self::RetriesExhausted { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) | Self::Credential(_) | Self::Clone(_) => {
                Some(StatusCode::INTERNAL_SERVER_ERROR.as_u16())
            }
            Self::Cancelled => None,
        }
    }

    pub fn category(&self) -> SendErrorCategory {
        match self {
            Self::StaleConcurrency { .. } => SendErrorCategory::StaleConcurrency,
            Self::Credential(_) => SendErrorCategory::AuthExpired,
            Self::Cancelled => SendErrorCategory::Cancelled,
            Self::RetriesExhausted { .. }
            | Self::Status { .. }
            | Self::Transport(_)
            | Self::Decode(_)
            | Self::Clone(_) => SendErrorCategory::Permanent,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Response body, when the failure came from a response.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::StaleConcurrency { body }
            | Self::RetriesExhausted { body, .. }
            | Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}
