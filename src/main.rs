//! Ballcone — entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use ballcone::config::Config;
use ballcone::core::geoip::{GeoIp, MaxMindGeoIp, NoGeoIp};
use ballcone::core::Ballcone;
use ballcone::{db, debug_tcp, http, syslog};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "ballcone=info".into()),
        )
        .json()
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting ballcone");

    let pool = db::create_pool(&config.database).await.context("failed to open database")?;
    let dao = db::Dao::new(pool);

    let geoip: Arc<dyn GeoIp> = match &config.geoip {
        Some(path) => {
            Arc::new(MaxMindGeoIp::open(path).with_context(|| format!("failed to open GeoIP database at {path}"))?)
        }
        None => {
            tracing::warn!("no GeoIP database configured, country enrichment disabled");
            Arc::new(NoGeoIp)
        }
    };

    let ballcone = Arc::new(Ballcone::new(dao, geoip, config.top_limit, config.days));

    let syslog_addr = config.syslog_addr().parse().context("invalid syslog address")?;
    let syslog_ballcone = Arc::clone(&ballcone);
    let syslog_handle = tokio::spawn(async move {
        if let Err(e) = syslog::run(syslog_addr, syslog_ballcone).await {
            tracing::error!(error = %e, "syslog listener exited");
        }
    });

    let debug_addr = config.debug_addr().parse().context("invalid debug address")?;
    let debug_ballcone = Arc::clone(&ballcone);
    let debug_handle = tokio::spawn(async move {
        if let Err(e) = debug_tcp::run(debug_addr, debug_ballcone).await {
            tracing::error!(error = %e, "debug TCP listener exited");
        }
    });

    let persist_handle = Arc::clone(&ballcone).spawn_persist_timer(std::time::Duration::from_secs(config.period));

    let app = http::router(Arc::clone(&ballcone));
    let web_addr = config.web_addr();
    let listener = tokio::net::TcpListener::bind(&web_addr).await.context("failed to bind HTTP listener")?;
    info!(address = %web_addr, "HTTP interface listening");

    let shutdown_signal = async {
        tokio::signal::ctrl_c().await.expect("failed to install CTRL+C signal handler");
        info!("received shutdown signal, cleaning up");
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await?;

    syslog_handle.abort();
    debug_handle.abort();
    persist_handle.abort();

    ballcone.persist().await;
    info!("shutdown complete");

    Ok(())
}
