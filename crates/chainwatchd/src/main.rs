//! chainwatchd: the chainwatch daemon.
//!
//! # Usage
//!
//! ```text
//! chainwatchd run --config /etc/chainwatch/chainwatch.toml
//! chainwatchd check-config --config chainwatch.toml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chainwatch_monitor::Scheduler;
use chainwatch_transport::FailoverTransport;
use chainwatchd::{build_monitors, build_registry, metric_names, router, ChainwatchConfig};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,chainwatchd=debug,chainwatch=debug";

#[derive(Parser)]
#[command(name = "chainwatchd", about = "Blockchain gateway monitor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the configured gateways and serve /metrics.
    Run {
        /// Path to chainwatch.toml.
        #[arg(long, default_value = "chainwatch.toml")]
        config: PathBuf,

        /// Override the listen address from the config file.
        #[arg(long)]
        listen: Option<String>,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },

    /// Validate a config file and list the metrics it would register.
    CheckConfig {
        #[arg(long, default_value = "chainwatch.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            listen,
            log_json,
        } => {
            init_tracing(log_json);
            run(config, listen).await
        }
        Command::CheckConfig { config } => {
            init_tracing(false);
            check_config(config)
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load(path: &Path) -> anyhow::Result<ChainwatchConfig> {
    let config = ChainwatchConfig::from_file(path)?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

async fn run(config_path: PathBuf, listen: Option<String>) -> anyhow::Result<()> {
    let mut config = load(&config_path)?;
    if let Some(listen) = listen {
        config.listen = listen;
    }
    let addr = config.listen_addr()?;
    let interval = config.poll_interval()?;

    info!(
        config = %config_path.display(),
        endpoints = config.endpoints.len(),
        "chainwatch daemon starting"
    );

    // ── Transport ──────────────────────────────────────────────

    let transport = Arc::new(
        FailoverTransport::from_endpoints(&config.endpoints, config.request_timeout()?)
            .context("building transport")?,
    );
    info!(hosts = ?transport.hosts(), "failover transport ready");

    // ── Monitors ───────────────────────────────────────────────

    let ctx = CancellationToken::new();
    let monitors = build_monitors(&config, transport);
    let registry = Arc::new(build_registry(monitors, &ctx).await?);
    let scheduler = Scheduler::start(&registry, interval, &ctx);

    // ── HTTP ───────────────────────────────────────────────────

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "metrics server listening");

    let shutdown = ctx.clone();
    let served = axum::serve(listener, router(registry))
        .with_graceful_shutdown(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => info!("shutdown signal received"),
                    Err(e) => {
                        error!(error = %e, "failed to listen for ctrl-c");
                        shutdown.cancelled().await;
                    }
                },
                _ = shutdown.cancelled() => {}
            }
            shutdown.cancel();
        })
        .await;

    ctx.cancel();
    scheduler.join().await;
    served.context("metrics server")?;

    info!("chainwatch daemon stopped");
    Ok(())
}

fn check_config(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load(&config_path)?;
    let transport = Arc::new(FailoverTransport::from_endpoints(
        &config.endpoints,
        config.request_timeout()?,
    )?);
    let monitors = build_monitors(&config, transport);
    let names = metric_names(&monitors)?;

    println!(
        "{}: {} endpoints, {} monitors, {} metrics",
        config_path.display(),
        config.endpoints.len(),
        monitors.len(),
        names.len()
    );
    for name in names {
        println!("  {name}");
    }
    Ok(())
}
