//! Serve command - runs the edge pipeline over HTTP

use std::net::SocketAddr;

use clap::Args;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::create_router;
use crate::config::AppConfig;
use crate::domain::RouteTable;
use crate::infrastructure::logging;
use crate::infrastructure::observability;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Override the configured listen port
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Run the edge server
pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load()?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    logging::init_logging(&config.logging);

    let metrics = observability::init_metrics(&config.metrics);
    let state = crate::create_app_state_with_config(&config, metrics).await?;
    let app = create_router(state);

    let addr = build_socket_addr(&config)?;
    info!("Starting storefront edge on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Load configuration and validate everything that is checked at startup
pub async fn check_config() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    let table = RouteTable::new(config.proxy.routes.clone())?;
    for (first, second) in table.overlaps() {
        println!("warning: prefixes '{}' and '{}' overlap; '{}' wins", first, second, first);
    }

    crate::create_app_state_with_config(&config, None).await?;
    build_socket_addr(&config)?;

    println!("Configuration OK ({} proxy routes)", config.proxy.routes.len());
    Ok(())
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
