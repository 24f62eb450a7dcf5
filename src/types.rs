//! Shared error and result types

use std::collections::BTreeMap;

use hyper::StatusCode;
use thiserror::Error;

/// Field name -> human-readable message, accumulated by validation.
/// A `BTreeMap` keeps iteration order stable for responses and tests.
pub type ErrorMap = BTreeMap<String, String>;

/// Error type for all Darshan operations
#[derive(Debug, Error)]
pub enum DarshanError {
    /// Missing or malformed fields; the map annotates each offending field
    #[error("validation failed")]
    Validation(ErrorMap),

    /// Request could not be understood (bad identifier, bad encoding)
    #[error("{0}")]
    BadRequest(String),

    /// No usable credentials on the request
    #[error("{0}")]
    Unauthorized(String),

    /// Actor is known but lacks the role, scope, or ownership required
    #[error("{0}")]
    Forbidden(String),

    /// Record or referenced foreign key does not exist
    #[error("{0}")]
    NotFound(String),

    /// Slug uniqueness violation within scope
    #[error("{0}")]
    Conflict(String),

    /// Asset host upload/transform failure (fatal to create/update)
    #[error("asset host error: {0}")]
    AssetHost(String),

    /// MongoDB failure
    #[error("database error: {0}")]
    Database(String),

    /// Anything unexpected; detail is logged, clients get a generic message
    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DarshanError {
    /// HTTP status the route boundary maps this error to
    pub fn http_status(&self) -> StatusCode {
        match self {
            DarshanError::Validation(_) | DarshanError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DarshanError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DarshanError::Forbidden(_) => StatusCode::FORBIDDEN,
            DarshanError::NotFound(_) => StatusCode::NOT_FOUND,
            DarshanError::Conflict(_) => StatusCode::CONFLICT,
            DarshanError::AssetHost(_)
            | DarshanError::Database(_)
            | DarshanError::Internal(_)
            | DarshanError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to API clients. Internal detail stays in logs.
    pub fn client_message(&self) -> String {
        match self {
            DarshanError::Validation(map) => {
                if map.is_empty() {
                    "validation failed".to_string()
                } else {
                    map.values().cloned().collect::<Vec<_>>().join("; ")
                }
            }
            DarshanError::Database(_) | DarshanError::Internal(_) | DarshanError::Io(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DarshanError>;
