use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub const X_GATEWAY_DEGRADED: HeaderName = HeaderName::from_static("x-gateway-degraded");

pub const RATE_LIMIT_MESSAGE: &str =
    "Rate limit exceeded. You have exceeded the maximum number of requests per minute.";

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Advisory rate limit headers attached to every limited route.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitHeaders {
    pub limit: u32,
    pub remaining: u32,
    pub retry_after: Option<u64>,
}

impl RateLimitHeaders {
    pub fn allowed(limit: u32, remaining: u32) -> Self {
        Self {
            limit,
            remaining,
            retry_after: None,
        }
    }

    pub fn denied(limit: u32, retry_after: u64) -> Self {
        Self {
            limit,
            remaining: 0,
            retry_after: Some(retry_after),
        }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));

        if let Some(retry_after) = self.retry_after {
            headers.insert(
                axum::http::header::RETRY_AFTER,
                HeaderValue::from(retry_after),
            );
            headers.insert(
                X_RATELIMIT_RESET,
                HeaderValue::from(epoch_millis() + retry_after * 1000),
            );
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitExceeded {
    pub timestamp: u64,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub retry_after: u64,
    pub path: String,
}

impl RateLimitExceeded {
    pub fn new(retry_after: u64, path: &str) -> Self {
        Self {
            timestamp: epoch_millis() / 1000,
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            error: "Too Many Requests".to_string(),
            message: RATE_LIMIT_MESSAGE.to_string(),
            retry_after,
            path: path.to_string(),
        }
    }

    pub fn into_response_with_limit(self, limit: u32) -> Response {
        let headers = RateLimitHeaders::denied(limit, self.retry_after);
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(self)).into_response();
        headers.apply(response.headers_mut());
        response
    }
}
