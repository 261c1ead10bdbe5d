use reqwest::StatusCode;
use thiserror::Error;

use crate::scan::state::ScanPhase;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    InvalidVar { name: &'static str, reason: String },

    #[error("could not decrypt API key: {0}")]
    ApiKey(String),

    #[error("kiosk configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("kiosk configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server rejected the request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

impl ApiError {
    /// Message suitable for showing to the person at the kiosk.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera available: {0}")]
    Unavailable(String),

    #[error("camera disconnected")]
    Disconnected,

    #[error("could not read frame: {0}")]
    Frame(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("a validation request is already in flight")]
    InFlight,

    #[error("QR code rejected: {0}")]
    Invalid(String),

    #[error("validation request failed: {0}")]
    Network(ApiError),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} has an unsupported value {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("nothing to submit while {0:?}")]
    NotReady(ScanPhase),

    #[error("{}: {}", .0.category.title(), .0.message)]
    Rejected(crate::scan::submission::SubmissionFailure),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

#[derive(Debug, Error)]
#[error("cannot apply {event} while {from:?}")]
pub struct InvalidTransition {
    pub from: ScanPhase,
    pub event: &'static str,
}
