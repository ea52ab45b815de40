//! Error types for the library client

use thiserror::Error;

/// Stable error codes, used by front ends to branch on the kind of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    BadValue = 1,
    TransportFailure = 2,
    ServiceFailure = 3,
    NoSuchItem = 4,
}

/// Main client error type.
///
/// Errors are `Clone` because a single in-flight read may be shared by
/// several callers, and every one of them receives the same failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Rejected locally, before any request was sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// No response was received from the service
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status or `success: false`
    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// The service reported that the resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ClientError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::Validation(_) => ErrorCode::BadValue,
            ClientError::Transport(_) => ErrorCode::TransportFailure,
            ClientError::Service { .. } => ErrorCode::ServiceFailure,
            ClientError::NotFound(_) => ErrorCode::NoSuchItem,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect();
        fields.sort();
        ClientError::Validation(fields.join("; "))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Transport(format!("Request timed out: {}", e))
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
