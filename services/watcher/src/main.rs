//! rancher-gen
//!
//! Renders templates from Rancher container metadata and keeps them current
//! by watching the project's `resource.change` events.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use rgen_rancher::RancherClient;
use rgen_watcher::{Cli, ConfigError, Dispatcher, RenderPipeline, Watcher};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit status for configuration errors.
const EXIT_CONFIG: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let deprecated_positional = cli.uses_deprecated_positional();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            print_config_error(&e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    if deprecated_positional {
        warn!("Positional TEMPLATE DEST arguments are deprecated, use --template SRC:DEST");
    }

    info!(
        endpoint = %config.endpoint.api_base(),
        scope = %config.scope,
        templates = config.jobs.len(),
        notify = config.notify.as_deref().unwrap_or("-"),
        "Configuration loaded"
    );

    let client = RancherClient::new(
        &config.endpoint,
        &config.credentials,
        config.request_timeout,
    )
    .context("failed to build Rancher client")?;

    let pipeline =
        RenderPipeline::new(config.jobs.clone(), config.notify.clone()).skip_empty(config.skip_empty);
    let dispatcher = Dispatcher::new(
        config.scope.clone(),
        Arc::new(client),
        pipeline,
        config.max_concurrent_renders,
    );

    if config.once {
        let reconciliation = dispatcher.reconcile("once").await;
        if reconciliation.report.failed > 0 {
            anyhow::bail!("{} template job(s) failed", reconciliation.report.failed);
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let watcher = Watcher::new(config.endpoint.clone(), config.credentials.clone(), dispatcher)
        .with_connect_timeout(config.request_timeout);
    let mut watcher_handle = tokio::spawn(async move { watcher.run(shutdown_rx).await });

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            None
        }
        result = &mut watcher_handle => Some(result),
    };

    let result = match finished {
        Some(result) => result,
        None => {
            let _ = shutdown_tx.send(true);
            watcher_handle.await
        }
    };

    match result {
        Ok(Ok(())) => {
            info!("rancher-gen shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "Watch loop failed");
            Err(e.into())
        }
        Err(e) => {
            error!(error = %e, "Watch task panicked");
            Err(e.into())
        }
    }
}

fn print_config_error(err: &ConfigError) {
    eprintln!("{} {}", "error:".red().bold(), err);

    let hint = match err {
        ConfigError::MissingHost => Some("Pass --host or set RANCHER_HOST."),
        ConfigError::MissingAccessKey => Some("Pass --access-key or set RANCHER_ACCESS_KEY."),
        ConfigError::MissingSecretKey => Some("Pass --secret-key or set RANCHER_SECRET_KEY."),
        ConfigError::MissingProjectId => Some("Pass --project-id or set RANCHER_PROJECT_ID."),
        ConfigError::MissingTemplate => Some("Pass --template /path/to/template:/path/to/output."),
        ConfigError::MissingDestination(_) => {
            Some("Pass TEMPLATE DEST together, or use --template /path/to/template:/path/to/output.")
        }
        _ => None,
    };
    if let Some(hint) = hint {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}
