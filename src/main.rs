use anyhow::Result;
use clap::Parser;
use movie_gateway::config::Config;
use movie_gateway::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("movie_gateway={},tower_http=debug", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting movie gateway");
    tracing::info!(
        "Configuration: bind_addr={}, omdb_api_url={}, rate_limit={}/{:?}, refill_mode={:?}",
        config.bind_addr,
        config.omdb_api_url,
        config.rate_limit_capacity,
        config.rate_limit_window,
        config.rate_limit_refill_mode
    );

    let server = Server::new(config)
        .map_err(|e| anyhow::anyhow!("Failed to create server: {}", e))?;

    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
