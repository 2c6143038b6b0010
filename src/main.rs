//! Power metrics exporter entry point: configuration, collector registration,
//! HTTP serving and graceful shutdown.

mod app;
mod config;
mod firmware;
mod metrics;
mod platform;
mod powertop;
mod system;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use app::cli::Args;
use app::logging::{init_tracing, resolve_log_filter};
use app::server::{self, ServerState};
use config::persistence::load_config;
use firmware::FirmwareCollector;
use powertop::{Powertop, PowertopGauges, Sampler};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).await?;
    args.apply(&mut config)?;

    // Priority: 1. --log-level flag, 2. LOG_LEVEL env, 3. config file, 4. default (info)
    let log_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| config.log_level.clone());
    let filter = resolve_log_filter(&log_level);
    init_tracing(filter.unwrap_or("info"));
    if filter.is_none() {
        warn!(
            "Invalid log level '{}'. Using INFO. Valid levels: TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL",
            log_level
        );
    }

    info!("Power Metrics Exporter v{} starting", env!("CARGO_PKG_VERSION"));
    match &args.config {
        Some(path) => info!("Loaded configuration from: {:?}", path),
        None => info!("No config file given, using built-in defaults"),
    }

    let is_raspberry_pi = platform::is_raspberry_pi(&config.firmware);
    let registry = metrics::new_registry()?;

    if is_raspberry_pi {
        let device_model = platform::read_device_model(&config.firmware.device_model_path);
        info!("Raspberry Pi detected: {}", device_model.as_deref().unwrap_or("unknown model"));

        let collector = FirmwareCollector::from_settings(
            &config.firmware,
            device_model.as_deref(),
            tokio::runtime::Handle::current(),
        )?;
        registry
            .register(Box::new(collector))
            .context("Failed to register Raspberry Pi collector")?;
        info!("Registered Raspberry Pi metrics (prefix: rpi_)");
    }

    let sampler = if !is_raspberry_pi || config.server.enable_comparison {
        let gauges = PowertopGauges::new()?;
        gauges
            .register(&registry)
            .context("Failed to register powertop metrics")?;

        let sampler = Arc::new(Sampler::new(
            Arc::new(Powertop::new(&config.sampler)),
            gauges,
            &config.sampler,
        ));
        let task = tokio::spawn({
            let sampler = Arc::clone(&sampler);
            async move { sampler.run().await }
        });
        info!("Registered powertop metrics (prefix: powertop_)");
        Some((sampler, task))
    } else {
        None
    };

    let listener = tokio::net::TcpListener::bind(&config.server.address)
        .await
        .with_context(|| format!("Failed to bind on {}", config.server.address))?;

    let state = Arc::new(ServerState {
        registry,
        metrics_path: config.server.metrics_path.clone(),
        is_raspberry_pi,
        enable_comparison: config.server.enable_comparison,
    });

    let served = server::serve(listener, state, async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received (Ctrl+C)");
    })
    .await;

    if let Some((sampler, task)) = sampler {
        sampler.stop().await;
        if let Err(e) = task.await {
            warn!("powertop sampler task ended abnormally: {}", e);
        }
    }

    served?;
    info!("Exporter shutdown complete");
    Ok(())
}
