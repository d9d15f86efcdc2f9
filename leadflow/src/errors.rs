//! Error types and HTTP response conversion.
//!
//! The [`Error`] enum covers the application's failure kinds and converts to
//! HTTP responses with a JSON `{"error": <kind>, "message": <text>}` body.
//! Silent kinds (a rejected field during validation, a duplicate delivery
//! insert) never surface here: the pipeline degrades the output instead.

use crate::db::errors::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// A required configuration value (API key, credential) is absent
    #[error("Missing configuration: {name}")]
    ConfigMissing { name: String },

    /// Inbound webhook failed signature verification
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Referenced subscription plan does not exist in the plan table
    #[error("Unknown subscription plan: {plan}")]
    PlanUnknown { plan: String },

    /// An outbound HTTP call failed
    #[error("External call to {service} failed: {message}")]
    ExternalHttp { service: String, message: String },

    /// An outbound HTTP call exceeded its deadline
    #[error("External call to {service} timed out")]
    ExternalTimeout { service: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Store operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Machine-readable kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ConfigMissing { .. } => "config_missing",
            Error::SignatureInvalid => "signature_invalid",
            Error::BadRequest { .. } => "bad_request",
            Error::NotFound { .. } => "not_found",
            Error::PlanUnknown { .. } => "plan_unknown",
            Error::ExternalHttp { .. } => "external_http_status",
            Error::ExternalTimeout { .. } => "external_http_timeout",
            Error::Internal { .. } => "internal",
            Error::Database(_) => "store_unavailable",
            Error::Other(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::ConfigMissing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::SignatureInvalid => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } | Error::PlanUnknown { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::ExternalHttp { .. } => StatusCode::BAD_GATEWAY,
            Error::ExternalTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns a user-safe message without internal implementation details.
    pub fn user_message(&self) -> String {
        match self {
            Error::ConfigMissing { name } => format!("Server is missing configuration: {name}"),
            Error::SignatureInvalid => "Signature verification failed".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::PlanUnknown { plan } => format!("Unknown subscription plan: {plan}"),
            Error::ExternalHttp { service, .. } => format!("Upstream service {service} unavailable"),
            Error::ExternalTimeout { service } => format!("Upstream service {service} timed out"),
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::Other(_) => "Storage error occurred".to_string(),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::SignatureInvalid => {
                tracing::warn!("Rejected inbound webhook: invalid signature");
            }
            Error::ConfigMissing { .. } | Error::ExternalHttp { .. } | Error::ExternalTimeout { .. } => {
                tracing::warn!("{}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = json!({
            "error": self.kind(),
            "message": self.user_message(),
        });
        (self.status_code(), axum::response::Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
