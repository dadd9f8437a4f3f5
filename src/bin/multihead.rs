//! multihead - grab one frame from every configured camera head
//!
//! This tool:
//! 1. Connects to the platform (or the synthetic stub)
//! 2. Lists the heads found in the platform configuration
//! 3. Opens one grab session per head
//! 4. Waits for a frame from each head and prints its capture time
//!
//! Exits non-zero if any head fails to open or times out.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use multihead_grabber::{device, run, GrabberConfig, Overrides, Reporter, RoundPolicy};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON config file (overrides MULTIHEAD_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Device URI: stub://NAME or a simulation document (*.json).
    #[arg(long)]
    device: Option<String>,
    /// Bounded wait per head, in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Round policy: collect-all or fail-fast.
    #[arg(long)]
    policy: Option<RoundPolicy>,
    /// Wait on all heads concurrently (`--parallel=false` turns it off).
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    parallel: Option<bool>,
    /// Number of rounds to run.
    #[arg(long)]
    rounds: Option<u32>,
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = match args.config.as_deref() {
        Some(path) => GrabberConfig::load_from(Some(path))?,
        None => GrabberConfig::load()?,
    };
    cfg.apply_overrides(Overrides {
        device: args.device,
        timeout_ms: args.timeout_ms,
        policy: args.policy,
        parallel: args.parallel,
        rounds: args.rounds,
    })?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        log::warn!("could not install Ctrl-C handler: {}", e);
    }

    let device = device::connect(&cfg.device)?;
    let mut reporter = Reporter::stdio();
    let summary = run(device.as_ref(), &cfg.acquisition, &mut reporter, &shutdown)?;

    log::info!(
        "done: endpoints={} rounds={} frames={} failures={}",
        summary.endpoints,
        summary.rounds_completed,
        summary.frames,
        summary.failures
    );
    Ok(ExitCode::from(summary.exit_code() as u8))
}
