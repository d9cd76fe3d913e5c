//! Error taxonomy for catalog, import and progression operations.

use thiserror::Error;

use crate::importer::ImportError;

/// Errors surfaced to the operator by any Mahakrama operation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgressionError {
    /// Field-level validation failed before anything was written
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// CSV payload rejected; nothing was imported
    #[error(transparent)]
    Import(#[from] ImportError),

    /// The person already has a step in progress
    #[error("{0}")]
    AlreadyInProgress(String),

    /// No current step exists to complete
    #[error("{0}")]
    NoCurrentStep(String),

    /// A transition precondition does not hold (e.g. completion before start)
    #[error("{0}")]
    Precondition(String),

    /// Fast completion needs operator confirmation before it is committed
    #[error("step completed within {days_elapsed} day(s); operator confirmation required")]
    ConfirmationRequired { days_elapsed: i64 },

    #[error("{0}")]
    NotFound(String),

    /// Write would break a store invariant (duplicate sequence, step in use)
    #[error("{0}")]
    Conflict(String),

    /// Network or non-2xx HTTP failure
    #[error("{}", transport_message(.status.as_ref(), .message))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// 401 from the server; the caller must re-authenticate
    #[error("Authentication failed. Please log in again.")]
    Auth,
}

fn transport_message(status: Option<&u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP {} - {}", code, message),
        None => format!("Network error - {}", message),
    }
}

impl ProgressionError {
    pub fn validation(message: impl Into<String>) -> Self {
        ProgressionError::Validation(vec![message.into()])
    }

    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        ProgressionError::Transport {
            status,
            message: message.into(),
        }
    }

    /// Check if the caller has to re-authenticate
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ProgressionError::Auth)
    }
}

impl From<reqwest::Error> for ProgressionError {
    fn from(err: reqwest::Error) -> Self {
        ProgressionError::transport(err.status().map(|s| s.as_u16()), err.to_string())
    }
}
