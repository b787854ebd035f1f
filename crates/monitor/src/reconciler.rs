//! Camera status reconciliation task.
//!
//! One task owns the [`Reconciler`] and is the only writer of session and
//! stream state. Everything else talks to it through a [`MonitorHandle`]:
//! commands go in over an mpsc channel, immutable [`MonitorSnapshot`]s come
//! out over a watch channel.
//!
//! Polls never overlap. The next one is scheduled only after the current one
//! has been applied, and an out-of-band poll resets the timer. A completed
//! poll is applied only if the task's [`CancelToken`] is still live.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use infaq_api::CameraStatusResponse;
use infaq_api_client::ApiClient;
use infaq_core::{
    AlertEvent, AlertHistory, CameraSession, ReconcilePhase, Reconciler, SourceMode,
    StreamEndpoints, StreamHandle, StreamLifecycle,
};
use infaq_runtime_config::MonitorSettings;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cancel::{CancelSource, CancelToken};

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub poll_interval: Duration,
    pub snapshot_interval: Duration,
    pub history_capacity: usize,
    /// Overrides `/camera/snapshot` for services that expose frames elsewhere.
    pub snapshot_path: Option<String>,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self::from_settings(&MonitorSettings::default())
    }
}

impl MonitorOptions {
    pub fn from_settings(settings: &MonitorSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            snapshot_interval: Duration::from_millis(settings.snapshot_interval_ms.max(1)),
            history_capacity: settings.history_capacity,
            snapshot_path: Some(settings.snapshot_path.trim())
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }
}

/// Extra `/camera/status` fields, shown to the operator but never reconciled.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ServerDiagnostics {
    pub stream_ready: Option<bool>,
    pub last_frame_ts: Option<f64>,
    pub last_cap_error: Option<String>,
    pub source: Option<String>,
    pub masjid_id: Option<i64>,
}

impl From<&CameraStatusResponse> for ServerDiagnostics {
    fn from(status: &CameraStatusResponse) -> Self {
        Self {
            stream_ready: status.stream_ready,
            last_frame_ts: status.last_frame_ts,
            last_cap_error: status.last_cap_error.clone(),
            source: status.source.clone(),
            masjid_id: status.masjid_id,
        }
    }
}

/// Reachability of the status endpoint as seen by the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// No poll has completed yet.
    Connecting,
    Online,
    /// Last poll failed; polling continues.
    Unreachable(String),
    /// A poll came back 401. Polling has stopped.
    Unauthenticated,
}

/// Everything a viewer needs to render, published after every change.
#[derive(Debug, Clone)]
pub struct MonitorSnapshot {
    pub phase: ReconcilePhase,
    pub link: LinkState,
    pub session: CameraSession,
    pub stream: Option<StreamHandle>,
    /// Live stream URL for the current run, kept while degraded for re-probes.
    pub primary_url: Option<String>,
    pub history: Vec<AlertEvent>,
    pub last_event: Option<AlertEvent>,
    pub diagnostics: Option<ServerDiagnostics>,
    pub polls_applied: u64,
}

impl MonitorSnapshot {
    fn initial() -> Self {
        Self {
            phase: ReconcilePhase::Idle,
            link: LinkState::Connecting,
            session: CameraSession::default(),
            stream: None,
            primary_url: None,
            history: Vec::new(),
            last_event: None,
            diagnostics: None,
            polls_applied: 0,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.link == LinkState::Unauthenticated
    }

    pub fn stream_url(&self) -> Option<&str> {
        self.stream.as_ref().map(|h| h.url.as_str())
    }
}

#[derive(Debug)]
enum Command {
    PollNow,
    LocalStop,
    ClearHistory,
    PrimaryError,
    PrimaryLoad,
    SetSource { mode: SourceMode, source_ref: String },
}

/// Cloneable front door to a running reconciliation task.
///
/// The task stops on [`MonitorHandle::shutdown`], after a 401, or once every
/// handle has been dropped.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<MonitorSnapshot>,
    cancel: Arc<CancelSource>,
}

impl MonitorHandle {
    fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Poll right away instead of waiting for the next tick.
    pub fn poll_now(&self) -> bool {
        self.send(Command::PollNow)
    }

    /// Clear alert mirror and stream URLs without waiting for the server.
    pub fn local_stop(&self) -> bool {
        self.send(Command::LocalStop)
    }

    pub fn clear_history(&self) -> bool {
        self.send(Command::ClearHistory)
    }

    pub fn primary_error(&self) -> bool {
        self.send(Command::PrimaryError)
    }

    pub fn primary_load(&self) -> bool {
        self.send(Command::PrimaryLoad)
    }

    pub fn set_source(&self, mode: SourceMode, source_ref: impl Into<String>) -> bool {
        self.send(Command::SetSource {
            mode,
            source_ref: source_ref.into(),
        })
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshots.clone()
    }

    /// Token that is cancelled together with this monitor.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.token()
    }

    /// Tear the task down. No poll fires and no in-flight result is applied
    /// after this returns.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Spawn the reconciliation task on the current runtime.
pub fn spawn_monitor(api: ApiClient, options: MonitorOptions) -> (MonitorHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (snap_tx, snap_rx) = watch::channel(MonitorSnapshot::initial());
    let cancel = Arc::new(CancelSource::new());
    let token = cancel.token();

    let task = tokio::spawn(run_monitor(api, options, cmd_rx, snap_tx, token));
    let handle = MonitorHandle {
        commands: cmd_tx,
        snapshots: snap_rx,
        cancel,
    };
    (handle, task)
}

enum PollFlow {
    Continue,
    Stop,
}

struct MonitorTask {
    api: ApiClient,
    reconciler: Reconciler,
    link: LinkState,
    last_event: Option<AlertEvent>,
    diagnostics: Option<ServerDiagnostics>,
    polls_applied: u64,
    snapshots: watch::Sender<MonitorSnapshot>,
    cancel: CancelToken,
}

async fn run_monitor(
    api: ApiClient,
    options: MonitorOptions,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<MonitorSnapshot>,
    cancel: CancelToken,
) {
    let mut endpoints = StreamEndpoints::new(api.edge_base());
    if let Some(path) = &options.snapshot_path {
        endpoints = endpoints.with_snapshot_path(path);
    }
    let reconciler = Reconciler::new(
        StreamLifecycle::new(endpoints),
        AlertHistory::with_capacity(options.history_capacity),
    );
    let mut task = MonitorTask {
        api,
        reconciler,
        link: LinkState::Connecting,
        last_event: None,
        diagnostics: None,
        polls_applied: 0,
        snapshots,
        cancel: cancel.clone(),
    };

    let mut snapshot_tick = tokio::time::interval(options.snapshot_interval);
    snapshot_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut next_poll = Instant::now();

    debug!("Monitor started (poll every {:?})", options.poll_interval);
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let degraded = task.reconciler.stream().is_degraded();
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = tokio::time::sleep_until(next_poll) => {
                if let PollFlow::Stop = task.poll().await {
                    break;
                }
                next_poll = Instant::now() + options.poll_interval;
            }

            Some(command) = commands.recv() => {
                if let Command::PollNow = command {
                    if let PollFlow::Stop = task.poll().await {
                        break;
                    }
                    next_poll = Instant::now() + options.poll_interval;
                } else {
                    task.handle(command);
                }
            }

            _ = snapshot_tick.tick(), if degraded => {
                if task.reconciler.refresh_snapshot(Utc::now()) {
                    task.publish();
                }
            }
        }
    }

    task.reconciler.teardown();
    task.publish();
    debug!("Monitor stopped");
}

impl MonitorTask {
    async fn poll(&mut self) -> PollFlow {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return PollFlow::Stop,
            result = self.api.camera_status() => result,
        };
        if self.cancel.is_cancelled() {
            debug!("Discarding status poll that finished after teardown");
            return PollFlow::Stop;
        }

        match result {
            Ok(status) => {
                self.apply(&status);
                PollFlow::Continue
            }
            Err(e) if e.is_auth() => {
                warn!("Status poll rejected, session is no longer authenticated");
                self.link = LinkState::Unauthenticated;
                PollFlow::Stop
            }
            Err(e) => {
                debug!("Status poll failed: {e}");
                let detail = e.detail();
                if self.link != LinkState::Unreachable(detail.clone()) {
                    self.link = LinkState::Unreachable(detail);
                    self.publish();
                }
                PollFlow::Continue
            }
        }
    }

    fn apply(&mut self, status: &CameraStatusResponse) {
        let token = self.api.session().token();
        self.reconciler
            .set_stream_credentials(self.api.edge_key(), token.as_deref());

        let Some(outcome) = self.reconciler.apply(status.polled(), Utc::now()) else {
            return;
        };
        self.polls_applied += 1;
        self.link = LinkState::Online;
        self.diagnostics = Some(ServerDiagnostics::from(status));

        if outcome.running_changed {
            info!(
                "Camera {}",
                if status.running { "running" } else { "stopped" }
            );
        }
        if let Some(event) = outcome.event {
            info!("Alert: box {}", event.status);
            self.last_event = Some(event);
        }
        self.publish();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::PollNow => {}
            Command::LocalStop => {
                self.reconciler.local_stop();
            }
            Command::ClearHistory => {
                self.reconciler.clear_history();
            }
            Command::PrimaryError => {
                if self.reconciler.on_primary_error(Utc::now()) {
                    info!("Live stream failed to load, switching to snapshots");
                }
            }
            Command::PrimaryLoad => {
                if self.reconciler.on_primary_load() {
                    info!("Live stream restored");
                }
            }
            Command::SetSource { mode, source_ref } => {
                self.reconciler.set_source(mode, &source_ref);
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let snapshot = MonitorSnapshot {
            phase: self.reconciler.phase(),
            link: self.link.clone(),
            session: self.reconciler.session().clone(),
            stream: self.reconciler.stream_handle(),
            primary_url: self.reconciler.stream().primary_url(),
            history: self.reconciler.history().to_vec(),
            last_event: self.last_event.clone(),
            diagnostics: self.diagnostics.clone(),
            polls_applied: self.polls_applied,
        };
        self.snapshots.send_replace(snapshot);
    }
}
