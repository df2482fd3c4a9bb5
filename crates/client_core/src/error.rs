use shared::{
    domain::SessionImageId,
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

use crate::controller::Phase;

const VALIDATION_MESSAGE: &str = "Please enter a prompt for every image.";
const LOAD_FALLBACK: &str = "Failed to load stage";
const SUBMIT_FALLBACK: &str = "Submission failed";
const NOT_FOUND_FALLBACK: &str = "Session not found.";

/// Failure of a single call against the scoring service.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("session not found")]
    NotFound(ApiError),
    #[error("display name has already played: {}", .0.detail.as_deref().unwrap_or("forbidden"))]
    AlreadyPlayed(ApiError),
    #[error("server rejected request: {0}")]
    Api(ApiError),
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed server response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn from_api(err: ApiError) -> Self {
        match err.code {
            ErrorCode::NotFound => ClientError::NotFound(err),
            _ => ClientError::Api(err),
        }
    }

    /// The server's `detail` message, when it sent one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ClientError::NotFound(err) | ClientError::AlreadyPlayed(err) | ClientError::Api(err) => {
                err.detail.as_deref()
            }
            ClientError::Network(_) | ClientError::Decode(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            ClientError::Decode(value.to_string())
        } else {
            ClientError::Network(value.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("missing prompt for {} image(s)", .missing.len())]
    Validation { missing: Vec<SessionImageId> },
    #[error("failed to load stage: {0}")]
    Load(ClientError),
    #[error("failed to submit stage: {0}")]
    Submit(ClientError),
    #[error("session not found: {0}")]
    NotFound(ClientError),
    #[error("prompt input is not accepted while {phase:?}")]
    InputNotAccepted { phase: Phase },
    #[error("image {0} is not part of the loaded stage")]
    UnknownImage(SessionImageId),
    #[error("cannot {action} while {phase:?}")]
    InvalidPhase { action: &'static str, phase: Phase },
    #[error("stage controller was closed")]
    Closed,
    #[error("result discarded: a newer stage load took over")]
    Superseded,
}

impl ControllerError {
    pub(crate) fn load(err: ClientError) -> Self {
        if err.is_not_found() {
            ControllerError::NotFound(err)
        } else {
            ControllerError::Load(err)
        }
    }

    pub(crate) fn submit(err: ClientError) -> Self {
        if err.is_not_found() {
            ControllerError::NotFound(err)
        } else {
            ControllerError::Submit(err)
        }
    }

    /// Whether retrying the same action can succeed without starting over.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ControllerError::Load(_) | ControllerError::Submit(_))
    }

    /// The session is gone; the only remedy is a new one.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ControllerError::NotFound(_))
    }

    pub fn player_message(&self) -> String {
        match self {
            ControllerError::Validation { .. } => VALIDATION_MESSAGE.to_string(),
            ControllerError::Load(err) => err.detail().unwrap_or(LOAD_FALLBACK).to_string(),
            ControllerError::Submit(err) => err.detail().unwrap_or(SUBMIT_FALLBACK).to_string(),
            ControllerError::NotFound(err) => {
                err.detail().unwrap_or(NOT_FOUND_FALLBACK).to_string()
            }
            other => other.to_string(),
        }
    }
}
