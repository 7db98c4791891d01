//! Serve command - run the control plane until shutdown

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tollgate::{GatewayContext, open_store};
use tollgate::settings::bootstrap_settings;
use tollgate_config::Config;
use tollgate_metering::{SystemClock, bootstrap};
use tracing::{error, info, warn};

/// Time each task gets to stop after shutdown is signalled
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Run the serve command
pub async fn run(config: Config, config_path: Option<&Path>) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        config = %config_path.map(|p| p.display().to_string()).unwrap_or_else(|| "(default)".to_string()),
        namespace = %config.gateway.namespace,
        "tollgate starting"
    );

    if let Err(e) = run_server(config).await {
        error!(error = %e, "server error");
        return Err(e);
    }

    info!("tollgate shutdown complete");
    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    let store = open_store(&config.store).await?;
    let seeded = bootstrap(store.as_ref(), &bootstrap_settings(&config.bootstrap))
        .await
        .context("store bootstrap failed")?;
    if seeded {
        warn!("seeded the initial manager key, replace it before exposing the gateway");
    }

    let (context, worker) =
        GatewayContext::new(config, store, Arc::new(SystemClock), cancel.clone());

    let reconciler = context.reconciler();
    let janitor = context.janitor(cancel.clone());

    let tasks: Vec<(&'static str, JoinHandle<()>)> = vec![
        ("usage consolidation", tokio::spawn(worker.run())),
        ("route reconciler", tokio::spawn(reconciler.run(cancel.clone()))),
        ("cache janitor", tokio::spawn(janitor.run())),
    ];

    info!(tasks = tasks.len(), "control plane running");

    wait_for_shutdown().await;
    info!("shutdown signal received, stopping tasks...");
    cancel.cancel();

    for (name, task) in tasks {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(task = name, error = %e, "task panicked during shutdown"),
            Err(_) => warn!(task = name, "task did not finish within timeout"),
        }
    }

    Ok(())
}

/// Wait for Ctrl-C or SIGTERM
///
/// If a handler cannot be installed the failure is logged and that signal
/// is ignored.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
