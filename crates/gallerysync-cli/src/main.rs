//! gallerysync demo driver.

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gallerysync_cli::{demo, Args};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "gallerysync=info".into()))
        .with(fmt::layer())
        .init();

    let args = Args::parse();
    let json = args.json;
    let (offline_for, outage_for) = args.outages();
    let config = args.into_config();

    tracing::info!(
        cache_ttl_secs = config.default_cache_ttl.as_secs(),
        reconnect_delay_ms = config.reconnect.initial_delay.as_millis() as u64,
        max_reconnect_attempts = config.reconnect.max_attempts,
        "starting gallerysync demo"
    );

    let report = demo::run(config, offline_for, outage_for).await;

    tracing::info!(
        status = %report.status,
        deliveries = report.deliveries,
        errors = report.errors,
        listeners = ?report.listeners,
        "demo finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report.metrics)?);
    } else {
        print!("{}", report.prometheus);
    }

    Ok(())
}
