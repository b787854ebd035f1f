use std::time::Duration;

use infaq_api_client::ApiClient;
use infaq_core::{StreamHandle, StreamMode};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::MonitorError;
use crate::reconciler::MonitorHandle;

/// How often the live stream is retried while showing snapshots.
pub const PRIMARY_REPROBE_INTERVAL: Duration = Duration::from_secs(5);

/// One JPEG frame fetched in snapshot mode.
#[derive(Debug, Clone)]
pub struct Frame {
    pub epoch: i64,
    pub bytes: Vec<u8>,
}

/// Follow the monitor's stream handle.
///
/// A fresh primary handle is probed once; failure is reported as a primary
/// error and the monitor drops to snapshots. Each snapshot URL is fetched and
/// handed to `frames` (a full channel skips the frame). While degraded the
/// primary stream is retried every [`PRIMARY_REPROBE_INTERVAL`].
pub async fn run_stream_watch(api: ApiClient, monitor: MonitorHandle, frames: mpsc::Sender<Frame>) {
    let cancel = monitor.cancel_token();
    let mut snapshots = monitor.subscribe();
    let mut probed_epoch: Option<i64> = None;
    let mut fetched_epoch: Option<i64> = None;
    let mut last_reprobe = Instant::now();

    loop {
        let (current, primary_url) = {
            let snapshot = snapshots.borrow_and_update();
            (snapshot.stream.clone(), snapshot.primary_url.clone())
        };
        match current {
            Some(handle) if handle.mode == StreamMode::Primary => {
                if probed_epoch != Some(handle.epoch) {
                    probed_epoch = Some(handle.epoch);
                    match probe(&api, &handle).await {
                        Ok(()) => {
                            monitor.primary_load();
                        }
                        Err(e) => {
                            info!("{e}");
                            monitor.primary_error();
                        }
                    }
                }
            }
            Some(handle) => {
                if fetched_epoch != Some(handle.epoch) {
                    fetched_epoch = Some(handle.epoch);
                    fetch_frame(&api, &handle, &frames).await;
                }
                if last_reprobe.elapsed() >= PRIMARY_REPROBE_INTERVAL {
                    last_reprobe = Instant::now();
                    if let Some(url) = primary_url {
                        if api.probe_stream(&url).await.is_ok() {
                            monitor.primary_load();
                        }
                    }
                }
            }
            None => {
                probed_epoch = None;
                fetched_epoch = None;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Stream watch stopped");
}

async fn probe(api: &ApiClient, handle: &StreamHandle) -> Result<(), MonitorError> {
    api.probe_stream(&handle.url)
        .await
        .map_err(|e| MonitorError::DegradedStream(e.detail()))
}

async fn fetch_frame(api: &ApiClient, handle: &StreamHandle, frames: &mpsc::Sender<Frame>) {
    match api.fetch_snapshot(&handle.url).await {
        Ok(Some(bytes)) => {
            let _ = frames.try_send(Frame {
                epoch: handle.epoch,
                bytes,
            });
        }
        Ok(None) => debug!("No frame available yet"),
        Err(e) => debug!("Snapshot fetch failed: {e}"),
    }
}
