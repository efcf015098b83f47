use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use regex::Regex;
use std::net::SocketAddr;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::handlers::SharedState;
use crate::key_generator::KeyGenerator;
use crate::response::RateLimitHeaders;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Paths that are never rate limited.
#[derive(Debug, Clone)]
pub struct RateLimitExemptions {
    pattern: Regex,
}

impl RateLimitExemptions {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            GatewayError::Configuration(format!("Invalid rate limit exemption pattern: {}", e))
        })?;
        Ok(Self { pattern })
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }
}

fn peer_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Logging middleware for request/response tracking
pub async fn logging_middleware(mut request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = KeyGenerator::client_identity(request.headers(), peer_addr(&request));

    let request_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("invalid"))
        });
    request.headers_mut().insert(X_REQUEST_ID, request_id.clone());

    info!(
        target: "movie_gateway::middleware",
        method = %method,
        uri = %uri,
        client_ip = %client_ip,
        request_id = ?request_id,
        "Incoming request"
    );

    let mut response = next.run(request).await;

    info!(
        target: "movie_gateway::middleware",
        method = %method,
        uri = %uri,
        status = %response.status(),
        request_id = ?request_id,
        "Request completed"
    );

    response.headers_mut().insert(X_REQUEST_ID, request_id);
    response
}

/// Admit or reject each request against its client's token bucket.
pub async fn rate_limit_middleware(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let path = request.uri().path().to_string();
    if state.exemptions.is_exempt(&path) {
        return Ok(next.run(request).await);
    }

    let client = KeyGenerator::client_identity(request.headers(), peer_addr(&request));
    let limit = state.rate_limiter.config().capacity;

    let admission = state.rate_limiter.admit(&client)?;
    state.metrics.record_admission(admission.allowed);

    if !admission.allowed {
        let retry_after = state.rate_limiter.seconds_until_refill(&client)?;
        warn!(
            target: "movie_gateway::middleware",
            client_ip = %client,
            path = %path,
            retry_after,
            "Rate limit exceeded"
        );
        return Err(GatewayError::RateLimited {
            limit,
            retry_after,
            path,
        });
    }

    let mut response = next.run(request).await;
    RateLimitHeaders::allowed(limit, admission.remaining).apply(response.headers_mut());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit_config::DEFAULT_EXEMPT_PATHS;

    #[test]
    fn test_default_exemptions() {
        let exemptions = RateLimitExemptions::new(DEFAULT_EXEMPT_PATHS).unwrap();

        for path in [
            "/health",
            "/api/v1/movies/health",
            "/actuator/info",
            "/swagger-ui/index.html",
            "/v3/api-docs",
            "/metrics",
        ] {
            assert!(exemptions.is_exempt(path), "{path} should be exempt");
        }
        for path in ["/api/v1/movies/search", "/api/v1/movies/popular", "/status/actuator"] {
            assert!(!exemptions.is_exempt(path), "{path} should be limited");
        }
    }

    #[test]
    fn test_titles_named_like_exempt_paths_are_limited() {
        let exemptions = RateLimitExemptions::new(DEFAULT_EXEMPT_PATHS).unwrap();

        for path in [
            "/api/v1/movies/title/health",
            "/api/v1/movies/metrics-x",
            "/api/v1/movies/title/swagger",
            "/api/v1/movies/health/extra",
            "/actuatorx",
            "/healthz",
        ] {
            assert!(!exemptions.is_exempt(path), "{path} should be limited");
        }
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        let err = RateLimitExemptions::new("(unclosed").unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }
}
