use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use infaq_monitor::{Frame, LinkState, MonitorSnapshot, run_stream_watch};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::context::AppContext;
use crate::output::{format_event, format_snapshot};

pub struct WatchArgs {
    pub interval: Option<Duration>,
    pub frame_out: Option<PathBuf>,
}

/// Atomically replace `path` with the latest snapshot frame.
async fn write_frame(path: &Path, frame: &Frame) {
    let tmp = path.with_extension("part");
    let result = async {
        tokio::fs::write(&tmp, &frame.bytes).await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;
    if let Err(e) = result {
        warn!("Could not write frame to {}: {e}", path.display());
    }
}

/// Live view in the terminal: alert events as they arrive plus a status line
/// whenever the link, session or stream changes. `c` + Enter clears the
/// history, `q` + Enter (or Ctrl-C) quits.
pub async fn run_watch(ctx: &AppContext, args: WatchArgs) -> Result<()> {
    ctx.require_login()?;
    let (monitor, task) = ctx.spawn_monitor(args.interval);

    let (frame_tx, mut frame_rx) = mpsc::channel::<Frame>(2);
    let streamer = tokio::spawn(run_stream_watch(ctx.api.clone(), monitor.clone(), frame_tx));

    let mut snapshots = monitor.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut last_line = String::new();
    let mut seen_event: Option<Uuid> = None;
    let mut frames_written = 0u64;

    eprintln!("Watching {} (c = clear history, q = quit)", ctx.api.edge_base());

    let outcome = loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let snapshot: MonitorSnapshot = snapshots.borrow_and_update().clone();
                if let Some(event) = &snapshot.last_event {
                    if seen_event != Some(event.id) {
                        seen_event = Some(event.id);
                        println!("{}", format_event(event));
                    }
                }
                let line = format_snapshot(&snapshot);
                if line != last_line {
                    eprintln!("{line}");
                    last_line = line;
                }
                if snapshot.link == LinkState::Unauthenticated {
                    break Err(());
                }
            }
            Some(frame) = frame_rx.recv() => {
                if let Some(path) = &args.frame_out {
                    write_frame(path, &frame).await;
                    frames_written += 1;
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(input)) => match input.trim() {
                    "c" => {
                        monitor.clear_history();
                        eprintln!("History cleared.");
                    }
                    "q" => break Ok(()),
                    _ => {}
                },
                _ => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    monitor.shutdown();
    let _ = task.await;
    let _ = streamer.await;
    ctx.sync_token();

    if frames_written > 0 {
        if let Some(path) = &args.frame_out {
            eprintln!("Wrote {frames_written} frame(s) to {}", path.display());
        }
    }
    if outcome.is_err() {
        bail!("Session expired. Run `infaq login` again.");
    }
    Ok(())
}
