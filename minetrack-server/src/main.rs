//! Minetrack Server - Bitcoin mining infrastructure tracker and valuation
//! service.

use anyhow::Result;
use minetrack_common::config::Config;
use minetrack_common::logging::init_logging_with_exclusions;
use minetrack_server::TrackerService;

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    // Load configuration
    let config = Config::load_with_env()?;

    // Initialize logging
    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Minetrack Server v{}", env!("CARGO_PKG_VERSION"));

    // Build the service (opens the store)
    let service = TrackerService::new(config)?;

    // Log startup timing before entering the serve loop
    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
