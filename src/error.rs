//! Error taxonomy for session and request-pipeline operations.
//!
//! ERROR HANDLING
//! ==============
//! Every failure carries a stable kind code so UI collaborators can branch
//! on category without string-matching display text. Display text is what
//! gets recorded in the session's `error` state, so the API variants keep
//! the server's message verbatim.

use crate::storage::StorageError;

/// Errors produced by API operations and the request pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response was received from the server at all.
    #[error("Network error occurred")]
    Network(String),

    /// The server answered with a non-success status or an error envelope.
    #[error("{message}")]
    Api {
        /// HTTP status code of the failing response.
        status: u16,
        /// Server-provided error message, or a generic fallback.
        message: String,
    },

    /// The session is no longer recoverable (refresh rejected or absent).
    #[error("{0}")]
    Auth(String),

    /// The response body could not be decoded.
    #[error("Invalid response format: {0}")]
    Parse(String),

    /// The persistent store failed underneath a write-through mutation.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Stable kind code for this error.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "NETWORK_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::Auth(_) => "AUTH_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// HTTP status of the failing response, when one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` when this error terminated the session.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
