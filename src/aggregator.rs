//! Orchestrates the upstream client and the response cache.
//!
//! Every call is a single linear pipeline: validate, look up the region,
//! load on a miss, then let the endpoint's [`FailurePolicy`](crate::fallback::FailurePolicy)
//! decide what an upstream failure turns into. No call is retried.

use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheConfig, CacheRegions};
use crate::clock::Clock;
use crate::error::{GatewayError, Result};
use crate::fallback::{Degradable, Endpoint, EndpointPolicies, FallbackResult};
use crate::key_generator::KeyGenerator;
use crate::metrics::GatewayMetrics;
use crate::models::{MovieDetails, MovieSummary, SearchParams, SearchRequest, SearchResponse};
use crate::upstream::{MovieApi, UpstreamError};
use crate::validation::RequestValidator;

/// Stand-in query for the curated "popular" list.
pub const POPULAR_QUERY: &str = "Batman";
pub const POPULAR_KEY: &str = "popular";
pub const POPULAR_LIMIT: usize = 10;

pub struct Aggregator {
    upstream: Arc<dyn MovieApi>,
    caches: CacheRegions,
    policies: EndpointPolicies,
    metrics: Arc<GatewayMetrics>,
}

impl Aggregator {
    pub fn new(
        upstream: Arc<dyn MovieApi>,
        cache_config: &CacheConfig,
        policies: EndpointPolicies,
        clock: Arc<dyn Clock>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            upstream,
            caches: CacheRegions::new(cache_config, clock),
            policies,
            metrics,
        }
    }

    pub fn caches(&self) -> &CacheRegions {
        &self.caches
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<FallbackResult<SearchResponse>> {
        let params = RequestValidator::validate_search(request)?;
        let key = KeyGenerator::search_key(&params);

        let result = self
            .caches
            .search
            .get_or_load(&key, || async {
                info!(
                    query = %params.title,
                    page = params.page,
                    kind = ?params.kind,
                    year = ?params.year,
                    "Searching movies (cache miss)"
                );
                let response = self.upstream.search(&params).await?;
                if response.is_success() {
                    info!(
                        query = %params.title,
                        total = response.total_results_as_u64(),
                        ttl = ?self.caches.search.ttl(),
                        "Found movies"
                    );
                } else {
                    warn!(query = %params.title, error = ?response.error, "No movies found");
                }
                Ok::<_, UpstreamError>(response)
            })
            .await;

        self.resolve(Endpoint::Search, result)
    }

    pub async fn get_details(&self, imdb_id: &str) -> Result<FallbackResult<MovieDetails>> {
        let imdb_id = RequestValidator::require_non_blank(imdb_id, "IMDB ID")?;
        let key = KeyGenerator::details_key(imdb_id);

        let result = self
            .caches
            .details
            .get_or_load(&key, || async {
                info!(imdb_id, "Getting movie details (cache miss)");
                let details = self.upstream.details_by_id(imdb_id).await?;
                Self::log_details(&details, imdb_id);
                Ok::<_, UpstreamError>(details)
            })
            .await;

        self.resolve(Endpoint::Details, result)
    }

    pub async fn get_details_by_title(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> Result<FallbackResult<MovieDetails>> {
        let title = RequestValidator::require_non_blank(title, "Title")?;
        let key = KeyGenerator::title_key(title, year);

        let result = self
            .caches
            .details
            .get_or_load(&key, || async {
                info!(title, ?year, "Getting movie by title (cache miss)");
                let details = self.upstream.details_by_title(title, year).await?;
                Self::log_details(&details, title);
                Ok::<_, UpstreamError>(details)
            })
            .await;

        self.resolve(Endpoint::Details, result)
    }

    /// First page of the curated list; an unsuccessful upstream answer yields an empty list.
    pub async fn get_popular(&self) -> Result<FallbackResult<Vec<MovieSummary>>> {
        let result = self
            .caches
            .popular
            .get_or_load(POPULAR_KEY, || async {
                info!("Getting popular movies (cache miss)");
                let params = SearchParams {
                    title: POPULAR_QUERY.to_string(),
                    page: 1,
                    kind: Some(crate::models::DEFAULT_TYPE.to_string()),
                    year: None,
                };
                let response = self.upstream.search(&params).await?;
                let movies: Vec<MovieSummary> = if response.is_success() {
                    response.search.into_iter().take(POPULAR_LIMIT).collect()
                } else {
                    Vec::new()
                };
                info!(count = movies.len(), "Retrieved popular movies");
                Ok::<_, UpstreamError>(movies)
            })
            .await;

        self.resolve(Endpoint::Popular, result)
    }

    /// Details that the upstream confirmed exist; a negative answer becomes `NotFound`.
    pub async fn validate_details(&self, imdb_id: &str) -> Result<MovieDetails> {
        let details = self.get_details(imdb_id).await?.into_inner();
        if details.is_success() {
            Ok(details)
        } else {
            Err(GatewayError::NotFound(format!(
                "Movie not found or invalid IMDB ID: {}",
                imdb_id.trim()
            )))
        }
    }

    fn resolve<T: Degradable>(
        &self,
        endpoint: Endpoint,
        result: std::result::Result<T, UpstreamError>,
    ) -> Result<FallbackResult<T>> {
        if result.is_err() {
            self.metrics.record_upstream_failure();
        }
        let resolved = self.policies.resolve(endpoint, result)?;
        if resolved.is_degraded() {
            self.metrics.record_degraded();
        }
        Ok(resolved)
    }

    fn log_details(details: &MovieDetails, lookup: &str) {
        if details.is_success() {
            info!(
                lookup,
                title = ?details.title,
                year = ?details.year,
                "Retrieved movie details"
            );
        } else {
            warn!(lookup, error = ?details.error, "Failed to get movie details");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::testutils::{details_found, details_missing, search_hit, ScriptedMovieApi};
    use std::time::Duration;

    fn aggregator(api: Arc<ScriptedMovieApi>) -> (Aggregator, MockClock, Arc<GatewayMetrics>) {
        let clock = MockClock::default();
        let metrics = Arc::new(GatewayMetrics::new());
        let aggregator = Aggregator::new(
            api,
            &CacheConfig::default(),
            EndpointPolicies::default(),
            Arc::new(clock.clone()),
            metrics.clone(),
        );
        (aggregator, clock, metrics)
    }

    fn batman() -> SearchRequest {
        SearchRequest {
            query: "Batman".to_string(),
            page: Some(1),
            kind: Some("movie".to_string()),
            year: None,
        }
    }

    #[tokio::test]
    async fn test_search_is_cached_for_fifteen_minutes() {
        let api = Arc::new(ScriptedMovieApi::new().with_search(Ok(search_hit(&["Batman Begins"]))));
        let (aggregator, clock, _) = aggregator(api.clone());

        let first = aggregator.search(&batman()).await.unwrap();
        clock.advance(Duration::from_secs(14 * 60));
        let second = aggregator.search(&batman()).await.unwrap();

        assert_eq!(api.search_calls(), 1);
        assert_eq!(first, second);
        let response = second.into_inner();
        assert_eq!(response.search.len(), 1);
        assert_eq!(response.search[0].title.as_deref(), Some("Batman Begins"));

        clock.advance(Duration::from_secs(60));
        aggregator.search(&batman()).await.unwrap();
        assert_eq!(api.search_calls(), 2);
    }

    #[tokio::test]
    async fn test_search_defaults_reach_upstream() {
        let api = Arc::new(ScriptedMovieApi::new().with_search(Ok(search_hit(&["Alien"]))));
        let (aggregator, _, _) = aggregator(api.clone());

        aggregator.search(&SearchRequest::new("Alien")).await.unwrap();

        let params = api.last_search().unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.kind.as_deref(), Some("movie"));
        // An explicit default hits the same cache entry.
        aggregator
            .search(&SearchRequest {
                page: Some(1),
                kind: Some("movie".into()),
                ..SearchRequest::new("Alien")
            })
            .await
            .unwrap();
        assert_eq!(api.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_search_failure_is_masked() {
        let api = Arc::new(
            ScriptedMovieApi::new().with_search(Err(UpstreamError::Transport("reset".into()))),
        );
        let (aggregator, _, metrics) = aggregator(api.clone());

        let result = aggregator.search(&batman()).await.unwrap();
        assert!(result.is_degraded());

        let response = result.into_inner();
        assert!(!response.is_success());
        assert!(response.search.is_empty());
        assert_eq!(response.total_results_as_u64(), 0);
        assert!(response.error.unwrap().contains("unavailable"));

        // Failures are not cached.
        aggregator.search(&batman()).await.unwrap();
        assert_eq!(api.search_calls(), 2);
        assert_eq!(metrics.degraded_responses(), 2);
    }

    #[tokio::test]
    async fn test_search_not_found_is_returned_unsuccessful() {
        let not_found = SearchResponse {
            response: "False".into(),
            error: Some("Movie not found!".into()),
            ..SearchResponse::default()
        };
        let api = Arc::new(ScriptedMovieApi::new().with_search(Ok(not_found)));
        let (aggregator, _, _) = aggregator(api);

        let result = aggregator.search(&SearchRequest::new("zzzzzz")).await.unwrap();
        assert!(!result.is_degraded());
        let response = result.into_inner();
        assert!(!response.is_success());
        assert!(response.search.is_empty());
        assert_eq!(response.error.as_deref(), Some("Movie not found!"));
    }

    #[tokio::test]
    async fn test_invalid_search_never_calls_upstream() {
        let api = Arc::new(ScriptedMovieApi::new().with_search(Ok(search_hit(&["x"]))));
        let (aggregator, _, _) = aggregator(api.clone());

        let blank = aggregator.search(&SearchRequest::new("  ")).await;
        assert!(matches!(blank, Err(GatewayError::InvalidRequest(_))));

        let page_zero = aggregator
            .search(&SearchRequest {
                page: Some(0),
                ..SearchRequest::new("Batman")
            })
            .await;
        assert!(matches!(page_zero, Err(GatewayError::InvalidRequest(_))));
        assert_eq!(api.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_details_negative_answer_passes_through_but_fails_validation() {
        let api = Arc::new(ScriptedMovieApi::new().with_details(Ok(details_missing("Incorrect ID"))));
        let (aggregator, _, _) = aggregator(api.clone());

        let details = aggregator.get_details("tt0000000").await.unwrap().into_inner();
        assert!(!details.is_success());
        assert_eq!(details.error.as_deref(), Some("Incorrect ID"));

        let err = aggregator.validate_details("tt0000000").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
        // Served from the item-details region the second time.
        assert_eq!(api.details_calls(), 1);
    }

    #[tokio::test]
    async fn test_details_failure_propagates() {
        let api = Arc::new(
            ScriptedMovieApi::new()
                .with_details(Err(UpstreamError::Timeout(Duration::from_secs(30)))),
        );
        let (aggregator, _, metrics) = aggregator(api);

        let err = aggregator.get_details("tt0372784").await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamFailure(UpstreamError::Timeout(_))));

        let err = aggregator.get_details_by_title("Batman Begins", Some(2005)).await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamFailure(_)));
        assert_eq!(metrics.upstream_failures(), 2);
    }

    #[tokio::test]
    async fn test_blank_identifiers_rejected_before_upstream() {
        let api = Arc::new(ScriptedMovieApi::new().with_details(Ok(details_found("tt1", "x"))));
        let (aggregator, _, _) = aggregator(api.clone());

        assert!(matches!(
            aggregator.get_details(" ").await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            aggregator.get_details_by_title("", None).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert_eq!(api.details_calls(), 0);
    }

    #[tokio::test]
    async fn test_details_by_title_and_id_cached_separately() {
        let api = Arc::new(
            ScriptedMovieApi::new().with_details(Ok(details_found("tt0372784", "Batman Begins"))),
        );
        let (aggregator, _, _) = aggregator(api.clone());

        let by_id = aggregator.validate_details("tt0372784").await.unwrap();
        let by_title = aggregator
            .get_details_by_title("Batman Begins", Some(2005))
            .await
            .unwrap()
            .into_inner();
        aggregator.get_details_by_title("Batman Begins", Some(2005)).await.unwrap();

        assert_eq!(by_id, by_title);
        assert_eq!(api.details_calls(), 2);
        assert_eq!(aggregator.caches().details.len(), 2);
    }

    #[tokio::test]
    async fn test_popular_truncates_and_caches() {
        let titles: Vec<String> = (0..15).map(|i| format!("Batman {i}")).collect();
        let titles: Vec<&str> = titles.iter().map(String::as_str).collect();
        let api = Arc::new(ScriptedMovieApi::new().with_search(Ok(search_hit(&titles))));
        let (aggregator, _, _) = aggregator(api.clone());

        let popular = aggregator.get_popular().await.unwrap().into_inner();
        assert_eq!(popular.len(), POPULAR_LIMIT);
        aggregator.get_popular().await.unwrap();
        assert_eq!(api.search_calls(), 1);
        assert_eq!(api.last_search().unwrap().title, POPULAR_QUERY);
    }

    #[tokio::test]
    async fn test_popular_failure_returns_empty_list() {
        let api = Arc::new(
            ScriptedMovieApi::new().with_search(Err(UpstreamError::Status(503))),
        );
        let (aggregator, _, _) = aggregator(api);

        let popular = aggregator.get_popular().await.unwrap();
        assert!(popular.is_degraded());
        assert!(popular.into_inner().is_empty());
    }
}
