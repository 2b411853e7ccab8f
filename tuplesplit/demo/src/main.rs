//! Tuplesplit Demo - Lockstep Splitting in Action
//!
//! Splits a ticking source of `[n, 2n]` pairs into two branches and consumes
//! each branch at its own pace. The log shows the source waiting for the
//! slowest consumer before producing the next pair.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 5 rounds, 1s interval, consumers sleeping 2s and 1s
//! tuplesplit-demo
//!
//! # Faster run with equal consumers
//! tuplesplit-demo --rounds 10 --interval-ms 100 --delay-ms 50 --delay-ms 50
//!
//! # Per-round driver logging
//! RUST_LOG=tuplesplit_core=debug tuplesplit-demo --trace-rounds
//! ```
//!
//! # Signals
//!
//! - `SIGINT`: abort the splitter; consumers finish with `driver_lost`

mod ticker;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tracing::{info, warn};

use tuplesplit_core::{
    default_config_path, load_config_from_path, split_with_config, ConfigOverrides,
};

use ticker::{consume, ticking_source, BranchReport};

/// Tuplesplit Demo - consume one tuple source from several paced branches
#[derive(Parser, Debug)]
#[command(name = "tuplesplit-demo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "TUPLESPLIT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of tuples the source produces
    #[arg(short = 'r', long)]
    rounds: Option<u64>,

    /// Delay between source tuples in milliseconds
    #[arg(short = 'i', long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Consumer delay in milliseconds; repeat once per branch
    #[arg(short = 'd', long = "delay-ms", value_name = "MS")]
    delay_ms: Vec<u64>,

    /// Splitter name used in log fields
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Log every delivered round at debug level
    #[arg(long)]
    trace_rounds: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "TUPLESPLIT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref name) = self.name {
            overrides = overrides.with_name(name.clone());
        }
        if self.trace_rounds {
            overrides = overrides.with_trace_rounds(true);
        }
        if let Some(rounds) = self.rounds {
            overrides = overrides.with_rounds(rounds);
        }
        if let Some(ms) = self.interval_ms {
            overrides = overrides.with_interval_ms(ms);
        }
        if !self.delay_ms.is_empty() {
            overrides = overrides.with_branch_delays_ms(self.delay_ms.clone());
        }
        overrides
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "tuplesplit_demo={level},tuplesplit_core={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

async fn collect_reports(mut consumers: JoinSet<BranchReport>) -> Result<Vec<BranchReport>> {
    let mut reports = Vec::with_capacity(consumers.len());
    while let Some(joined) = consumers.join_next().await {
        reports.push(joined.context("Consumer task failed")?);
    }
    reports.sort_by_key(|r| r.index);
    Ok(reports)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        splitter = %config.splitter.name,
        rounds = config.demo.rounds,
        interval = ?config.demo.source_interval,
        source = %config.source(),
        "Starting demo"
    );

    let source = ticking_source(config.demo.rounds, config.demo.source_interval);
    let (branches, handle) = split_with_config(source, config.splitter.clone())
        .await
        .context("Failed to start splitter")?
        .into_parts();

    let mut consumers = JoinSet::new();
    for branch in branches {
        let delay = config.demo.delay_for(branch.index());
        info!(branch = branch.index(), delay = ?delay, "Starting consumer");
        consumers.spawn(consume(branch, delay));
    }

    let interrupt = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(splitter = %handle.name(), "Interrupted, aborting splitter");
                handle.abort();
            }
        })
    };

    let reports = collect_reports(consumers).await?;
    interrupt.abort();

    for report in &reports {
        info!(
            branch = report.index,
            received = report.values.len(),
            values = ?report.values,
            outcome = report.outcome,
            "Branch summary"
        );
    }

    match handle.stopped().await {
        Some(outcome) => info!(outcome = %outcome, "Splitter finished"),
        None => info!("Splitter finished with every branch closed"),
    }

    Ok(())
}
