use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::error::StoreError;

/// Response envelope returned as JSON across the C boundary.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum AppResponse {
    DatabaseError(String),
    SerializationError(String),
    ValidationError(String),
    BadRequest(String),
    NotAuthenticated(String),
    StoreUnavailable(String),
    Ok(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppResponse::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppResponse::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppResponse::NotAuthenticated(msg) => write!(f, "Not authenticated: {}", msg),
            AppResponse::StoreUnavailable(msg) => write!(f, "Store unavailable: {}", msg),
            AppResponse::Ok(msg) => write!(f, "Ok: {}", msg),
        }
    }
}

impl From<StoreError> for AppResponse {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotAuthenticated => {
                AppResponse::NotAuthenticated("No identity session; sign in first".to_string())
            }
            StoreError::StoreUnavailable(msg) => AppResponse::StoreUnavailable(msg),
            StoreError::InvalidRecord(msg) => AppResponse::ValidationError(msg),
            StoreError::Database(msg) => AppResponse::DatabaseError(msg),
            StoreError::Serialization(msg) => AppResponse::SerializationError(msg),
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, AppResponse::Ok(_))
    }
}
