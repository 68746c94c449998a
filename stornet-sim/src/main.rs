// Storage virtual network simulator: load a scenario, drive its transfers, print the report.

mod config;
mod driver;
mod report;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    let mut config_path: Option<PathBuf> = None;
    let mut json = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("stornet-sim {}", VERSION);
                return Ok(());
            }
            "--config" | "-c" => {
                let p = args.next().context("--config needs a path")?;
                config_path = Some(PathBuf::from(p));
            }
            "--json" => json = true,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = config::load(config_path.as_deref())?;
    let net = driver::build_network(&cfg)?;
    let net: driver::SharedNetwork = Arc::new(tokio::sync::Mutex::new(net));
    tracing::info!(
        nodes = cfg.nodes.len(),
        links = cfg.links.len(),
        transfers = cfg.transfers.len(),
        concurrent = cfg.concurrent,
        "simulation starting"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let (stop, shutdown) = driver::Shutdown::new();
    let transfers = rt.block_on(async {
        tokio::spawn(async move {
            match shutdown_signal().await {
                Ok(()) => {
                    tracing::warn!("interrupted, cancelling in-progress transfers");
                    let _ = stop.send(true);
                }
                Err(e) => tracing::warn!(error = %e, "signal handler unavailable"),
            }
        });
        driver::run(net.clone(), &cfg, shutdown).await
    });

    let report = rt.block_on(async { report::collect(&*net.lock().await, transfers) });
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report::render(&report));
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
