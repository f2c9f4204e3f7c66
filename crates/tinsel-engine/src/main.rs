//! Command-line entry point for the Tinsel simulation.
//!
//! Gnomes decorate a tree of capacity-bounded levels while a delivery
//! drops ornaments at its foot on a fixed interval.
//!
//! # Usage
//!
//! ```text
//! tinsel-engine N_GNOMES ORNAMENT_INSTALLATION_TIME_MICROSECONDS \
//!     ORNAMENTS_PER_DELIVERY DELIVERY_INTERVAL_MICROSECONDS N_LEVELS \
//!     GNOME_CAP_0 .. GNOME_CAP_{N_LEVELS-1} \
//!     ORNAMENT_CAP_0 .. ORNAMENT_CAP_{N_LEVELS-1}
//!
//! tinsel-engine --config workshop.yaml
//! ```
//!
//! # Startup Sequence
//!
//! 1. Parse arguments and load the configuration
//! 2. Initialize structured logging (tracing)
//! 3. Run the workshop until every gnome has stopped
//! 4. Log the summary and exit non-zero if the final audit failed

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tinsel_core::{EventSink, NullSink, TracingSink, WorkshopConfig, log_summary, run_workshop};
use tinsel_tree::AuditResult;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Tinsel: gnomes decorating a christmas tree without deadlocking.
#[derive(Debug, Parser)]
#[command(name = "tinsel-engine")]
#[command(version, about, long_about = None)]
struct Cli {
    /// N_GNOMES INSTALL_US PER_DELIVERY INTERVAL_US N_LEVELS, then
    /// N_LEVELS gnome caps and N_LEVELS ornament caps
    #[arg(
        value_name = "ARGS",
        required_unless_present = "config",
        conflicts_with = "config"
    )]
    values: Vec<u64>,

    /// Path to a YAML workshop configuration
    #[arg(short, long, env = "TINSEL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Close the delivery after this many seconds (0 = unlimited)
    #[arg(long, value_name = "SECONDS")]
    max_run_seconds: Option<u64>,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins
    #[arg(long, env = "TINSEL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    summary_json: bool,

    /// Skip the per-event trace lines; only the banner and summary are logged
    #[arg(long)]
    no_trace: bool,
}

impl Cli {
    /// Build the workshop configuration from the file or positional form,
    /// then apply command-line overrides.
    fn workshop_config(&self) -> Result<WorkshopConfig, EngineError> {
        let mut config = match &self.config {
            Some(path) => WorkshopConfig::from_file(path)?,
            None => WorkshopConfig::from_positional(&self.values)?,
        };
        if let Some(seconds) = self.max_run_seconds {
            config.run.max_real_time_seconds = seconds;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
        config.validate()?;
        Ok(config)
    }

    /// Where the per-event trace goes.
    fn event_sink(&self) -> Arc<dyn EventSink> {
        if self.no_trace {
            Arc::new(NullSink)
        } else {
            Arc::new(TracingSink)
        }
    }
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error for invalid arguments or configuration (before any
/// gnome starts), for a failed run, or when the final tree audit fails.
#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse arguments and load configuration.
    let cli = Cli::parse();
    let config = cli
        .workshop_config()
        .context("invalid workshop configuration")?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("tinsel-engine starting");

    // 3. Run the workshop.
    let summary = run_workshop(&config, cli.event_sink())
        .await
        .map_err(EngineError::from)?;

    // 4. Report.
    log_summary(&summary);

    if cli.summary_json {
        let json = serde_json::to_string_pretty(&summary).map_err(EngineError::from)?;
        println!("{json}");
    }

    if let AuditResult::Anomaly(anomaly) = &summary.audit {
        return Err(EngineError::Audit {
            message: anomaly.to_string(),
        }
        .into());
    }
    Ok(())
}
