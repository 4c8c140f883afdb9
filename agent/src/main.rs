//! SENTRIX Agent - live attack globe host
//!
//! Polls the alert bridge over HTTP and drives the attack globe runtime on
//! Tokio:
//! - Headless mode logs a one-line summary per second
//! - `--dashboard` renders the terminal globe on its own thread

use anyhow::{Context, Result};
use clap::Parser;
use sentrix_core::{FramePacket, SentrixConfig, SentrixRuntime, ThreatDashboard};
use sentrix_env::TokioContext;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod http_feed;

use http_feed::HttpFeed;

#[derive(Parser, Debug)]
#[command(name = "sentrix-agent")]
#[command(about = "Live attack globe fed by the SENTRIX alert bridge", long_about = None)]
struct Args {
    /// Alert bridge status endpoint
    #[arg(short, long, default_value = "http://localhost:5050/api/status")]
    url: String,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP timeout in milliseconds
    #[arg(long, default_value = "2000")]
    timeout_ms: u64,

    /// Show the terminal dashboard instead of logging
    #[arg(long)]
    dashboard: bool,

    /// Verbose output (ignored when RUST_LOG is set)
    #[arg(short, long)]
    verbose: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn init_logging(verbose: bool, dashboard: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // The dashboard owns the terminal
    if dashboard {
        builder.with_writer(std::io::sink).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
}

fn log_packet(packet: &FramePacket) {
    let selected = packet
        .selected
        .as_ref()
        .map(|s| format!("{} {} from {}", s.id, s.attack_type, s.source))
        .unwrap_or_else(|| "-".to_string());
    info!(
        t = packet.time_secs,
        active = packet.events.len(),
        arcs = packet.arcs.len(),
        accepted = packet.stats.accepted,
        duplicates = packet.stats.duplicates,
        "Selected: {}",
        selected
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.dashboard);

    let config = match &args.config {
        Some(path) => SentrixConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SentrixConfig::default(),
    };

    if args.print_config {
        print!("{}", config.to_toml_string().context("serializing config")?);
        return Ok(());
    }

    let ctx = TokioContext::shared();
    let feed = Arc::new(HttpFeed::new(&args.url, Duration::from_millis(args.timeout_ms)));
    info!(url = %args.url, "SENTRIX Agent starting");

    let globe = config.globe.clone();
    let frames_per_log = u64::from(config.runtime.frame_rate_hz.max(1));
    let mut runtime = SentrixRuntime::new(ctx, feed, config);

    if args.dashboard {
        let (tx, rx) = crossbeam::channel::bounded::<FramePacket>(4);
        let interactions = runtime.interactions();
        let ui = std::thread::spawn(move || {
            let mut dashboard = ThreatDashboard::new(rx, interactions, globe);
            dashboard.run()
        });

        runtime
            .run(|packet| match tx.try_send(packet.clone()) {
                Err(crossbeam::channel::TrySendError::Disconnected(_)) => ControlFlow::Break(()),
                // A slow terminal just skips frames
                _ => ControlFlow::Continue(()),
            })
            .await;

        match ui.join() {
            Ok(result) => result.context("dashboard terminal error")?,
            Err(_) => anyhow::bail!("dashboard thread panicked"),
        }
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let ctrl_c = Arc::clone(&stop);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            return;
        }
        ctrl_c.store(true, Ordering::Relaxed);
    });

    let mut frames = 0u64;
    runtime
        .run(|packet| {
            if stop.load(Ordering::Relaxed) {
                return ControlFlow::Break(());
            }
            frames += 1;
            if frames % frames_per_log == 0 {
                log_packet(packet);
            }
            ControlFlow::Continue(())
        })
        .await;

    let stats = runtime.stats();
    info!(
        accepted = stats.accepted,
        duplicates = stats.duplicates,
        evicted = stats.evicted,
        "SENTRIX Agent stopped"
    );
    Ok(())
}
