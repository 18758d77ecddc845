use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use tiervault_keeper::config::create_example_config;
use tiervault_keeper::{Keeper, KeeperConfig};

#[derive(Parser, Debug)]
#[command(name = "tiervault-keeper")]
#[command(about = "Rebalancing and compounding keeper for tier vaults")]
struct Args {
    /// Path to keeper configuration file
    #[arg(short, long, default_value = "keeper.toml")]
    config: String,

    /// Write an example configuration to the config path and exit
    #[arg(long)]
    init_config: bool,

    /// Update interval in seconds (overrides the configured default)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Stop after this many iterations
    #[arg(short = 'n', long)]
    iterations: Option<u64>,

    /// Dry run mode - report rebalances but don't submit them
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    if args.init_config {
        create_example_config(&args.config)
            .with_context(|| format!("writing example config to {}", args.config))?;
        info!("Wrote example configuration to {}", args.config);
        return Ok(());
    }

    info!("Starting tier vault keeper");

    // Load configuration
    let config = KeeperConfig::load(&args.config).with_context(|| format!("loading {}", args.config))?;
    let interval = args.interval.unwrap_or(config.default_update_interval);

    info!("Loaded configuration for {} vaults", config.vaults.len());
    info!("Keeper account: {}", config.keeper_account);
    info!("Update interval: {}s", interval);

    if args.dry_run {
        warn!("Running in DRY RUN mode - no rebalances will be submitted");
    }

    // Initialize keeper
    let mut keeper = Keeper::new(config, args.dry_run)?;

    info!("Keeper initialized successfully");

    // Start main update loop
    let mut interval_timer = time::interval(Duration::from_secs(interval.max(1)));
    let mut iteration = 0u64;

    loop {
        interval_timer.tick().await;
        iteration += 1;

        debug!("Starting keeper iteration {}", iteration);

        match keeper.run_iteration().await {
            Ok(summary) => {
                if summary.rebalanced > 0 || summary.compounded > 0 {
                    info!(
                        "Iteration {}: rebalanced {} vaults, compounded {}",
                        iteration, summary.rebalanced, summary.compounded
                    );
                } else {
                    debug!("Iteration {}: No vaults needed attention", iteration);
                }
            }
            Err(e) => {
                error!("Error in keeper iteration {}: {}", iteration, e);
                // Continue running even if individual iterations fail
            }
        }

        // Basic health metrics every 100 iterations
        if iteration % 100 == 0 {
            info!("Keeper health check - iteration {}", iteration);
            if let Err(e) = keeper.health_check().await {
                warn!("Health check warning: {}", e);
            }
        }

        if args.iterations.is_some_and(|limit| iteration >= limit) {
            info!("Completed {} iterations, stopping", iteration);
            if let Err(e) = keeper.health_check().await {
                warn!("Health check warning: {}", e);
            }
            return Ok(());
        }
    }
}
