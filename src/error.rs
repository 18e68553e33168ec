// src/error.rs

use std::fmt;

use thiserror::Error;

use crate::models::Id;

pub type ClientResult<T> = Result<T, ClientError>;

/// A non-2xx response as the backend described it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub status: u16,
    pub message: String,
    /// Structured error code, when the backend sends one.
    pub code: Option<String>,
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (HTTP {})", self.message, self.status)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Sign in failed: {0}")]
    InvalidCredentials(String),

    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    #[error("Not signed in")]
    NotSignedIn,
}

/// Pre-submit check failure. Raised before any request goes out.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InviteError {
    #[error("Invite link has expired: {0}")]
    Expired(String),

    #[error("Invite link is invalid: {0}")]
    Invalid(String),

    #[error("Could not load group preview: {0}")]
    Preview(String),

    #[error("Failed to join: {0}")]
    Join(String),

    #[error("Group preview must be loaded before joining")]
    PreviewRequired,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MembershipError {
    #[error("User {0} has no pending request (already approved or removed)")]
    NotPending(Id),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Invite(#[from] InviteError),

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error("Not found: {0}")]
    NotFound(ApiFailure),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Request failed: {0}")]
    Api(ApiFailure),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("A request for task {0} is already in progress")]
    Busy(Id),

    #[error("Not supported: {0}")]
    Unsupported(&'static str),
}

impl ClientError {
    /// Builds the error for a failed response, keyed on status.
    pub(crate) fn from_failure(failure: ApiFailure) -> Self {
        match failure.status {
            403 => ClientError::Permission(failure.message),
            404 => ClientError::NotFound(failure),
            _ => ClientError::Api(failure),
        }
    }

    /// The backend's own failure description, if this error came from a response.
    pub fn api_failure(&self) -> Option<&ApiFailure> {
        match self {
            ClientError::NotFound(f) | ClientError::Api(f) => Some(f),
            _ => None,
        }
    }

    /// Errors a front end shows as a full-page state rather than a notification.
    pub fn is_navigational(&self) -> bool {
        matches!(self, ClientError::NotFound(_) | ClientError::Permission(_))
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::NotFound(f) | ClientError::Api(f) => f.message.clone(),
            ClientError::Permission(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
