use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::HeaderValue,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::aggregator::Aggregator;
use crate::clock::Clock;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::fallback::FallbackResult;
use crate::health::{HealthChecker, HealthStatus};
use crate::metrics::{GatewayMetrics, MetricsSnapshot};
use crate::middleware::RateLimitExemptions;
use crate::models::{MovieDetails, MovieSummary, SearchQuery, SearchRequest, SearchResponse};
use crate::rate_limiter::RateLimiter;
use crate::response::X_GATEWAY_DEGRADED;
use crate::upstream::MovieApi;

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Everything a request needs; each component synchronizes itself.
pub struct AppState {
    pub gateway: Aggregator,
    pub rate_limiter: RateLimiter,
    pub exemptions: RateLimitExemptions,
    pub metrics: Arc<GatewayMetrics>,
    pub cors_allowed_origins: Vec<String>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: &GatewayConfig,
        upstream: Arc<dyn MovieApi>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let metrics = Arc::new(GatewayMetrics::new());
        let exemptions = RateLimitExemptions::new(&config.rate_limit.exempt_paths)?;
        let rate_limiter = RateLimiter::new(config.rate_limit.clone(), clock.clone())?;
        let gateway = Aggregator::new(
            upstream,
            &config.cache,
            config.policies,
            clock,
            metrics.clone(),
        );

        Ok(Self {
            gateway,
            rate_limiter,
            exemptions,
            metrics,
            cors_allowed_origins: config.cors_allowed_origins.clone(),
            started_at: Instant::now(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TitleQuery {
    pub year: Option<u16>,
}

fn search_response(result: FallbackResult<SearchResponse>) -> Response {
    let degraded = result.is_degraded();
    let mut response = Json(result.into_inner()).into_response();
    if degraded {
        response
            .headers_mut()
            .insert(X_GATEWAY_DEGRADED, HeaderValue::from_static("true"));
    }
    response
}

/// Search by JSON body
pub async fn search_movies(
    State(state): State<SharedState>,
    payload: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload?;
    info!(?request, "Received search request");

    let result = state.gateway.search(&request).await?;
    Ok(search_response(result))
}

/// Search by query string
pub async fn search_movies_simple(
    State(state): State<SharedState>,
    query: std::result::Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query?;
    let request = SearchRequest::from(query);
    info!(?request, "Received simple search request");

    let result = state.gateway.search(&request).await?;
    Ok(search_response(result))
}

/// Details by IMDb id; 404 when the upstream does not know the id.
pub async fn get_movie_details(
    State(state): State<SharedState>,
    Path(imdb_id): Path<String>,
) -> Result<Json<MovieDetails>> {
    info!(imdb_id = %imdb_id, "Received request for movie details");
    let details = state.gateway.validate_details(&imdb_id).await?;
    Ok(Json(details))
}

/// Details by title and optional year; 404 when the upstream has no match.
pub async fn get_movie_by_title(
    State(state): State<SharedState>,
    Path(title): Path<String>,
    query: std::result::Result<Query<TitleQuery>, QueryRejection>,
) -> Result<Json<MovieDetails>> {
    let Query(TitleQuery { year }) = query?;
    info!(title = %title, ?year, "Received request for movie by title");

    let details = state
        .gateway
        .get_details_by_title(&title, year)
        .await?
        .into_inner();
    if !details.is_success() {
        return Err(GatewayError::NotFound(format!(
            "Movie not found: {}",
            title.trim()
        )));
    }
    Ok(Json(details))
}

pub async fn get_popular_movies(
    State(state): State<SharedState>,
) -> Result<Json<Vec<MovieSummary>>> {
    info!("Received request for popular movies");
    let movies = state.gateway.get_popular().await?.into_inner();
    Ok(Json(movies))
}

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthStatus> {
    Json(HealthChecker::check_health(&state))
}

pub async fn metrics(State(state): State<SharedState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot(
        state.rate_limiter.tracked_clients(),
        state.gateway.caches().stats(),
    ))
}
