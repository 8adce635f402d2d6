//! Headless detection overlay player binary.

use std::path::PathBuf;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bladescan_player::HeadlessPlayer;

const DEFAULT_LOG_FILTER: &str =
    "bladescan_player=info,bladescan_sync=info,bladescan_media=info,bladescan_ml_client=info";

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let Some(video) = std::env::args().nth(1).map(PathBuf::from) else {
        error!("Usage: bladescan-player <video-file>");
        std::process::exit(2);
    };

    info!("Starting bladescan-player");

    let player = match HeadlessPlayer::from_env() {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create player: {}", e);
            std::process::exit(1);
        }
    };
    info!("Player config: {:?}", player.config());

    if let Some(addr) = player.config().metrics_addr {
        match PrometheusBuilder::new().with_http_listener(addr).install() {
            Ok(()) => info!(%addr, "Prometheus exporter listening"),
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    }

    tokio::select! {
        result = player.play(&video) => match result {
            Ok(report) => info!(
                session_id = %report.session_id,
                total = report.totals.total,
                samples = report.samples,
                snapshots = report.snapshots.len(),
                "Playback finished"
            ),
            Err(e) => {
                error!("Playback failed: {}", e);
                std::process::exit(1);
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Player shutdown complete");
}
