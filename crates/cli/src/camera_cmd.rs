use std::time::Duration;

use anyhow::{Context, Result};
use infaq_core::SourceMode;
use infaq_monitor::{MonitorHandle, SessionController};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::context::AppContext;
use crate::output::{format_snapshot, print_status};

/// How long `camera start` waits for the server to report the capture running.
const START_CONFIRM_TIMEOUT: Duration = Duration::from_secs(6);

pub struct StartArgs {
    pub mode: Option<SourceMode>,
    pub source: Option<String>,
    pub no_loop: bool,
    pub no_wait: bool,
}

async fn finish(controller: SessionController, task: JoinHandle<()>) {
    controller.monitor().shutdown();
    let _ = task.await;
}

/// Wait until the monitor sees `running == true` or the timeout expires.
async fn confirm_running(monitor: &MonitorHandle) -> bool {
    let mut rx = monitor.subscribe();
    let wait = rx.wait_for(|s| s.session.running || s.is_unauthenticated());
    match timeout(START_CONFIRM_TIMEOUT, wait).await {
        Ok(Ok(snapshot)) => snapshot.session.running,
        _ => false,
    }
}

pub async fn run_start(ctx: &AppContext, args: StartArgs) -> Result<()> {
    let defaults = &ctx.config.camera;
    let mode = args.mode.unwrap_or(defaults.mode);
    let source = match args.source {
        Some(source) => source,
        None if mode == defaults.mode => defaults.source_ref(),
        None => String::new(),
    };
    let looped = defaults.looped && !args.no_loop;

    let (monitor, task) = ctx.spawn_monitor(None);
    let controller = ctx.controller(monitor);
    let result = controller.start(mode, &source, looped).await;
    ctx.sync_token();
    let resp = match result {
        Ok(resp) => resp,
        Err(e) => {
            finish(controller, task).await;
            return Err(e).context("Could not start camera");
        }
    };

    if resp.already_running() {
        println!("Camera already running.");
    } else {
        println!("Start requested: {mode} {source}");
    }
    if !args.no_wait {
        if confirm_running(controller.monitor()).await {
            println!("{}", format_snapshot(&controller.monitor().snapshot()));
        } else {
            println!("Server has not reported the camera running yet.");
        }
    }
    finish(controller, task).await;
    Ok(())
}

pub async fn run_start_default(ctx: &AppContext, no_wait: bool) -> Result<()> {
    let (monitor, task) = ctx.spawn_monitor(None);
    let controller = ctx.controller(monitor);
    let result = controller.start_from_default().await;
    ctx.sync_token();
    let resp = match result {
        Ok(resp) => resp,
        Err(e) => {
            finish(controller, task).await;
            return Err(e).context("Could not start camera from the saved source");
        }
    };

    match (resp.source.as_deref(), resp.masjid_id) {
        (Some(source), Some(id)) => println!("Start requested: {source} (masjid #{id})"),
        (Some(source), None) => println!("Start requested: {source}"),
        _ => println!("Start requested."),
    }
    if !no_wait && !confirm_running(controller.monitor()).await {
        println!("Server has not reported the camera running yet.");
    }
    finish(controller, task).await;
    Ok(())
}

pub async fn run_stop(ctx: &AppContext) -> Result<()> {
    let (monitor, task) = ctx.spawn_monitor(None);
    let controller = ctx.controller(monitor);
    let result = controller.stop().await;
    ctx.sync_token();
    finish(controller, task).await;
    result.context("Stop request failed")?;
    println!("Camera stopped.");
    Ok(())
}

pub async fn run_status(ctx: &AppContext, json: bool) -> Result<()> {
    let status = ctx.api.camera_status().await;
    ctx.sync_token();
    let status = status.context("Could not read camera status")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}
