//! Routes command - print the routing table for the current tenants

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tollgate::{GatewayContext, open_store};
use tollgate_config::Config;
use tollgate_metering::SystemClock;

/// Routes command arguments
#[derive(Args, Debug)]
pub struct RoutesArgs {
    /// Print compact JSON on one line
    #[arg(long)]
    pub compact: bool,
}

/// Run the routes command
pub async fn run(config: Config, args: RoutesArgs) -> Result<()> {
    let store = open_store(&config.store).await?;
    store
        .ensure_schema()
        .await
        .context("failed to prepare store schema")?;

    let (context, _worker) =
        GatewayContext::new(config, store, Arc::new(SystemClock), CancellationToken::new());
    context
        .reconciler()
        .tick()
        .await
        .context("route reconciliation failed")?;

    let table = context.publisher.current();
    let json = if args.compact {
        serde_json::to_string(table.as_ref())?
    } else {
        serde_json::to_string_pretty(table.as_ref())?
    };
    println!("{json}");
    Ok(())
}
