use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use isolwatch::{IsolWatchEngine, Output, settings::Settings, telemetry};

/// Report processes running on CPUs reserved by isolcpus/rcu_nocbs.
#[derive(Debug, Parser)]
struct Opt {
    /// Verbose output
    #[clap(short, long)]
    verbose: bool,

    /// Seconds between polling ticks
    #[clap(short, long, env = "ISOLWATCH_INTERVAL_SECS")]
    interval: Option<u64>,

    /// Kernel command line to read isolation parameters from
    #[clap(long)]
    cmdline: Option<PathBuf>,

    /// Run a single tick and exit
    #[clap(long)]
    once: bool,

    /// Do not clear the terminal between ticks
    #[clap(long)]
    no_clear: bool,

    /// Write reports through the logger instead of the terminal view
    #[clap(long)]
    log_report: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if opt.verbose || opt.log_report { "info" } else { "warn" },
    ))
    .init();

    let mut settings = Settings::new().context("Failed to load settings")?;
    if let Some(interval) = opt.interval {
        settings.interval_secs = Some(interval);
    }
    if let Some(cmdline) = opt.cmdline {
        settings.cmdline_path = Some(cmdline);
    }
    if opt.no_clear {
        settings.clear_screen = Some(false);
    }

    telemetry::init_metrics()?;

    let mut engine = IsolWatchEngine::new(settings).once(opt.once);
    if opt.log_report {
        engine = engine.with_output(Output::Log);
    }
    let res = engine.run().await;

    telemetry::shutdown_metrics();
    res
}
