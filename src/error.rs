//! Error types for the berth orchestrator
//!
//! Errors carry the pipeline step that failed so a caller reading a 500 can
//! tell a cleanup failure from an apply failure without consulting logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Main error type for berth operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Request or configuration validation error
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
    },

    /// Cluster-facing step failure
    #[error("cluster error [{step}]: {message}")]
    Cluster {
        /// Pipeline step that failed (e.g., "cleanup", "secret", "apply")
        step: String,
        /// Underlying diagnostic text
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a cluster error with step context
    pub fn cluster(step: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Cluster {
            step: step.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Wrap this error with the pipeline step it occurred in.
    ///
    /// Validation errors pass through untouched: they are caller mistakes,
    /// not infrastructure failures, and must keep their 400 mapping.
    pub fn in_step(self, step: &str) -> Self {
        match self {
            Self::Validation { .. } => self,
            Self::Cluster { .. } => self,
            other => Self::Cluster {
                step: step.to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Kube { .. } | Error::Cluster { .. } | Error::Serialization { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}
