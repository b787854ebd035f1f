use std::path::Path;

use anyhow::{Context, Result, bail};
use infaq_core::StreamEndpoints;
use infaq_monitor::MonitorOptions;

use crate::context::AppContext;

/// Fetch one JPEG frame from the snapshot endpoint and write it to `out`.
pub async fn run_snapshot(ctx: &AppContext, out: &Path) -> Result<()> {
    ctx.require_login()?;
    let mut endpoints = StreamEndpoints::new(ctx.api.edge_base());
    if let Some(path) = MonitorOptions::from_settings(&ctx.config.monitor).snapshot_path {
        endpoints = endpoints.with_snapshot_path(&path);
    }
    let token = ctx.api.session().token();
    endpoints.set_credentials(ctx.api.edge_key(), token.as_deref());
    let url = endpoints.snapshot_url(chrono::Utc::now().timestamp_millis());

    let frame = ctx.api.fetch_snapshot(&url).await;
    ctx.sync_token();
    let Some(bytes) = frame.context("Snapshot request failed")? else {
        bail!("No frame available yet. Is the camera running?");
    };
    tokio::fs::write(out, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Saved {} bytes to {}", bytes.len(), out.display());
    Ok(())
}
