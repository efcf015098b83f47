use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::response::{RateLimitExceeded, RATE_LIMIT_MESSAGE};
use crate::upstream::UpstreamError;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Upstream failure: {0}")]
    UpstreamFailure(#[from] UpstreamError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limit exceeded on {path}, retry after {retry_after}s")]
    RateLimited {
        limit: u32,
        retry_after: u64,
        path: String,
    },
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for GatewayError {
    fn from(err: validator::ValidationErrors) -> Self {
        GatewayError::InvalidRequest(err.to_string())
    }
}

impl From<axum::extract::rejection::JsonRejection> for GatewayError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        GatewayError::InvalidRequest(err.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for GatewayError {
    fn from(err: axum::extract::rejection::QueryRejection) -> Self {
        GatewayError::InvalidRequest(err.body_text())
    }
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Configuration(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub timestamp: u64,
    pub status: u16,
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16) -> Self {
        Self {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            status,
            error: error.to_string(),
            message: message.to_string(),
        }
    }

    pub fn from_gateway_error(err: &GatewayError) -> Self {
        let status = err.status_code().as_u16();
        match err {
            GatewayError::InvalidRequest(msg) => Self::new("Bad Request", msg, status),
            GatewayError::UpstreamFailure(e) => {
                Self::new("Upstream API Error", &e.to_string(), status)
            }
            GatewayError::NotFound(msg) => Self::new("Not Found", msg, status),
            GatewayError::RateLimited { .. } => {
                Self::new("Too Many Requests", RATE_LIMIT_MESSAGE, status)
            }
            // Configuration details stay in the logs.
            GatewayError::Configuration(_) | GatewayError::Internal(_) => Self::new(
                "Internal Server Error",
                "An unexpected error occurred",
                status,
            ),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            GatewayError::UpstreamFailure(_)
            | GatewayError::Configuration(_)
            | GatewayError::Internal(_) => tracing::error!(error = %self, "Request failed"),
            _ => tracing::debug!(error = %self, "Request rejected"),
        }

        if let GatewayError::RateLimited {
            limit,
            retry_after,
            path,
        } = self
        {
            return RateLimitExceeded::new(retry_after, &path).into_response_with_limit(limit);
        }

        let body = ErrorResponse::from_gateway_error(&self);
        (self.status_code(), Json(body)).into_response()
    }
}
