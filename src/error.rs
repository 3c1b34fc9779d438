use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::expiration::InvalidExpiration;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Outcomes of paste store operations other than success.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),
    #[error("paste not found")]
    NotFound,
    #[error("paste has expired")]
    Gone,
    #[error("could not allocate a free paste id after {attempts} attempts")]
    IdSpaceExhausted { attempts: usize },
    #[error("storage error")]
    Storage {
        #[from]
        source: StorageError,
    },
}

/// Failure of the persistence backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error")]
    Database {
        #[from]
        source: sqlx::Error,
    },
    #[error("corrupt record '{id}': {reason}")]
    Corrupt { id: String, reason: String },
}

/// Errors reported to API callers.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    InvalidExpiration(#[from] InvalidExpiration),
    #[error("paste not found")]
    NotFound,
    #[error("paste has expired and was deleted")]
    Gone,
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("internal error")]
    Internal {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl ApiError {
    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::InvalidExpiration(_) => "invalid_expiration",
            ApiError::NotFound => "not_found",
            ApiError::Gone => "gone",
            ApiError::PayloadTooLarge => "payload_too_large",
            ApiError::Internal { .. } => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidExpiration(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Gone => StatusCode::GONE,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(source: StoreError) -> Self {
        match source {
            StoreError::Validation(message) => ApiError::Validation(message),
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Gone => ApiError::Gone,
            source @ (StoreError::IdSpaceExhausted { .. } | StoreError::Storage { .. }) => {
                ApiError::Internal {
                    source: Box::new(source),
                }
            }
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl From<&ApiError> for ErrorBody {
    fn from(error: &ApiError) -> Self {
        ErrorBody {
            error: error.kind(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal { source } = &self {
            error!("internal error: {source:?}");
        }

        (self.status_code(), Json(ErrorBody::from(&self))).into_response()
    }
}
