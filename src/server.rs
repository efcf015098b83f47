use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::error::Result;
use crate::handlers::{
    get_movie_by_title, get_movie_details, get_popular_movies, health_check, metrics,
    search_movies, search_movies_simple, AppState, SharedState,
};
use crate::middleware::{logging_middleware, rate_limit_middleware, X_REQUEST_ID};
use crate::response::{X_GATEWAY_DEGRADED, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET};
use crate::upstream::OmdbClient;

pub struct Server {
    state: SharedState,
    bind_addr: SocketAddr,
    cleanup_interval: Duration,
}

impl Server {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let upstream = OmdbClient::new(&config.upstream_config())?;
        let state = AppState::new(
            &config.gateway_config(),
            Arc::new(upstream),
            Arc::new(SystemClock),
        )?;

        Ok(Self {
            state: Arc::new(state),
            bind_addr: config.bind_addr,
            cleanup_interval: config.cleanup_interval,
        })
    }

    pub async fn run(self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        info!("Movie gateway listening on {}", self.bind_addr);
        info!("Health check available at /health");

        let cleanup = spawn_cleanup(self.state.clone(), self.cleanup_interval);
        let app = create_app(self.state);

        // Run server with graceful shutdown
        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        cleanup.abort();
        served?;
        Ok(())
    }
}

pub fn create_app(state: SharedState) -> Router {
    let cors = cors_layer(&state.cors_allowed_origins);

    Router::new()
        .route(
            "/api/v1/movies/search",
            get(search_movies_simple).post(search_movies),
        )
        .route("/api/v1/movies/popular", get(get_popular_movies))
        .route("/api/v1/movies/health", get(health_check))
        .route("/api/v1/movies/title/:title", get(get_movie_by_title))
        .route("/api/v1/movies/:imdb_id", get(get_movie_details))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn(logging_middleware)),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers([
            X_RATELIMIT_LIMIT,
            X_RATELIMIT_REMAINING,
            X_RATELIMIT_RESET,
            header::RETRY_AFTER,
            X_GATEWAY_DEGRADED,
            X_REQUEST_ID,
        ])
        .max_age(Duration::from_secs(3600))
}

/// Periodically drop idle buckets and expired cache entries.
fn spawn_cleanup(state: SharedState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = state.rate_limiter.evict_idle();
            let purged = state.gateway.caches().purge_expired();
            debug!(
                evicted_buckets = evicted,
                purged_entries = purged,
                tracked_clients = state.rate_limiter.tracked_clients(),
                "Cleanup sweep finished"
            );
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
