//! Error taxonomy for the intake handler
//!
//! Every error maps to a status code and a caller-safe message. Details that
//! matter to the operator (config keys, channel responses) are logged here and
//! never placed in the response body.

use http::{Method, StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::config::{ChannelKind, ConfigError};
use crate::types::{DispatchResult, IntakeResponse, RejectReason};

/// Broad class of an [`IntakeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request, missing fields, bad email syntax
    ClientInput,
    /// Email domain refused by policy
    PolicyRejection,
    /// Server-side misconfiguration
    Configuration,
    /// Notification channel failed
    Channel,
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(Method),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Submission rejected: {0}")]
    Rejected(RejectReason),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Dispatch to {channel} failed: {result}")]
    Channel {
        channel: ChannelKind,
        result: DispatchResult,
    },

    #[error("Dispatch task aborted: {0}")]
    Task(String),
}

impl IntakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MethodNotAllowed(_) | Self::InvalidJson(_) => ErrorKind::ClientInput,
            Self::Rejected(reason) => match reason {
                RejectReason::DomainNotAllowed | RejectReason::DomainUnreachable => {
                    ErrorKind::PolicyRejection
                }
                _ => ErrorKind::ClientInput,
            },
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Channel { .. } | Self::Task(_) => ErrorKind::Channel,
        }
    }

    pub fn status(&self) -> StatusCode {
        match (self, self.kind()) {
            (Self::MethodNotAllowed(_), _) => StatusCode::METHOD_NOT_ALLOWED,
            (_, ErrorKind::ClientInput) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::PolicyRejection) => StatusCode::FORBIDDEN,
            (_, ErrorKind::Configuration) | (_, ErrorKind::Channel) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show the caller
    pub fn public_message(&self) -> String {
        match self {
            Self::MethodNotAllowed(_) => "Method Not Allowed".to_string(),
            Self::InvalidJson(_) => "Invalid JSON".to_string(),
            Self::Rejected(reason) => reason.to_string(),
            Self::Configuration(_) => "Service not configured".to_string(),
            Self::Channel { .. } | Self::Task(_) => "Failed to deliver message".to_string(),
        }
    }

    /// Log the error and build the response body
    pub fn into_response(self) -> IntakeResponse {
        match self.kind() {
            ErrorKind::ClientInput | ErrorKind::PolicyRejection => {
                info!(error = %self, "Submission refused");
            }
            ErrorKind::Configuration | ErrorKind::Channel => {
                error!(error = %self, "Submission failed");
            }
        }

        IntakeResponse::json(self.status(), &json!({ "error": self.public_message() }))
    }
}
