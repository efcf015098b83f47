pub mod aggregator;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod fallback;
pub mod handlers;
pub mod health;
pub mod key_generator;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod rate_limit_config;
pub mod rate_limiter;
pub mod response;
pub mod server;
#[cfg(any(test, feature = "testutils"))]
pub mod testutils;
pub mod token_bucket;
pub mod upstream;
pub mod validation;

pub use config::Config;
pub use error::{GatewayError, Result};
pub use server::create_app;
