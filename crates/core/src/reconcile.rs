//! Camera session reconciliation state machine.
//!
//! The server is the single source of truth for `running` and `alert_status`.
//! Every applied poll overwrites both fields wholesale, feeds the stream
//! lifecycle, and runs the alert-transition rule:
//!
//! an event is recorded only when the polled status is non-null and differs
//! from the last status that itself produced an event. Null polls neither
//! produce events nor reset that reference.

use chrono::{DateTime, Utc};

use crate::session::{AlertEvent, AlertHistory, AlertStatus, CameraSession, SourceMode};
use crate::stream::{StreamHandle, StreamLifecycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    /// Created, no poll applied yet.
    Idle,
    Polling,
    /// Torn down. Nothing is applied after this.
    Stopped,
}

/// The reconciled subset of `/camera/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolledStatus {
    pub running: bool,
    pub alert_status: Option<AlertStatus>,
}

/// What a single applied poll changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileOutcome {
    pub event: Option<AlertEvent>,
    pub running_changed: bool,
    pub stream_restarted: bool,
}

/// Alert-transition rule. Returns the status to record, if any.
pub fn alert_transition(
    last_alerted: Option<AlertStatus>,
    polled: Option<AlertStatus>,
) -> Option<AlertStatus> {
    match polled {
        Some(status) if last_alerted != Some(status) => Some(status),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    phase: ReconcilePhase,
    session: CameraSession,
    last_alerted: Option<AlertStatus>,
    history: AlertHistory,
    stream: StreamLifecycle,
}

impl Reconciler {
    pub fn new(stream: StreamLifecycle, history: AlertHistory) -> Self {
        Self {
            phase: ReconcilePhase::Idle,
            session: CameraSession::default(),
            last_alerted: None,
            history,
            stream,
        }
    }

    pub fn phase(&self) -> ReconcilePhase {
        self.phase
    }

    pub fn is_live(&self) -> bool {
        self.phase != ReconcilePhase::Stopped
    }

    pub fn session(&self) -> &CameraSession {
        &self.session
    }

    pub fn history(&self) -> &AlertHistory {
        &self.history
    }

    pub fn stream(&self) -> &StreamLifecycle {
        &self.stream
    }

    pub fn stream_handle(&self) -> Option<StreamHandle> {
        if self.session.running {
            self.stream.handle()
        } else {
            None
        }
    }

    pub fn stream_url(&self) -> Option<String> {
        self.stream.url_for(&self.session)
    }

    /// Record the operator's chosen source. Server mirrors are untouched.
    pub fn set_source(&mut self, mode: SourceMode, source_ref: &str) {
        self.session.mode = mode;
        self.session.source_ref = source_ref.to_string();
    }

    pub fn set_stream_credentials(&mut self, edge_key: Option<&str>, token: Option<&str>) {
        self.stream.set_credentials(edge_key, token);
    }

    /// Apply one poll result. Returns `None` once torn down.
    pub fn apply(&mut self, polled: PolledStatus, now: DateTime<Utc>) -> Option<ReconcileOutcome> {
        if self.phase == ReconcilePhase::Stopped {
            return None;
        }
        self.phase = ReconcilePhase::Polling;

        let running_changed = self.session.running != polled.running;
        self.session.running = polled.running;
        self.session.alert_status = polled.alert_status;
        let stream_restarted = self
            .stream
            .observe_running(polled.running, now.timestamp_millis());

        let event = alert_transition(self.last_alerted, polled.alert_status).map(|status| {
            self.last_alerted = Some(status);
            let event = AlertEvent::new(status, now);
            self.history.push(event.clone());
            event
        });

        Some(ReconcileOutcome {
            event,
            running_changed,
            stream_restarted,
        })
    }

    /// Operator stop: clear the alert mirror and every stream URL right away.
    /// The next poll still wins.
    pub fn local_stop(&mut self) {
        self.session.running = false;
        self.session.alert_status = None;
        self.stream.stop();
    }

    /// Drop local history only. The transition reference survives so a
    /// repeated status does not immediately re-enter the cleared list.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn on_primary_error(&mut self, now: DateTime<Utc>) -> bool {
        self.session.running && self.stream.on_primary_error(now.timestamp_millis())
    }

    pub fn on_primary_load(&mut self) -> bool {
        self.stream.on_primary_load()
    }

    pub fn refresh_snapshot(&mut self, now: DateTime<Utc>) -> bool {
        self.session.running && self.stream.refresh_snapshot(now.timestamp_millis())
    }

    pub fn teardown(&mut self) {
        self.phase = ReconcilePhase::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::HISTORY_CAPACITY;
    use crate::stream::{StreamEndpoints, StreamMode};
    use chrono::Duration;

    fn reconciler() -> Reconciler {
        Reconciler::new(
            StreamLifecycle::new(StreamEndpoints::new("http://edge")),
            AlertHistory::default(),
        )
    }

    fn polled(running: bool, alert_status: Option<AlertStatus>) -> PolledStatus {
        PolledStatus {
            running,
            alert_status,
        }
    }

    fn feed(r: &mut Reconciler, statuses: &[Option<AlertStatus>]) -> usize {
        let base = Utc::now();
        statuses
            .iter()
            .enumerate()
            .filter_map(|(i, s)| r.apply(polled(true, *s), base + Duration::seconds(i as i64)))
            .filter(|o| o.event.is_some())
            .count()
    }

    #[test]
    fn consecutive_duplicates_are_suppressed() {
        use AlertStatus::*;
        let mut r = reconciler();
        let events = feed(
            &mut r,
            &[
                Some(Present),
                Some(Present),
                Some(Missing),
                Some(Missing),
                Some(Present),
            ],
        );
        assert_eq!(events, 3);
        let statuses: Vec<_> = r.history().iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![Present, Missing, Present]);
    }

    #[test]
    fn null_polls_do_not_reset_the_reference() {
        use AlertStatus::*;
        let mut r = reconciler();
        assert_eq!(feed(&mut r, &[Some(Present), None, Some(Present)]), 1);
        assert_eq!(feed(&mut r, &[None, Some(Missing)]), 1);
        assert_eq!(r.history().len(), 2);
        assert_eq!(r.session().alert_status, Some(Missing));
    }

    #[test]
    fn transition_rule_truth_table() {
        use AlertStatus::*;
        assert_eq!(alert_transition(None, None), None);
        assert_eq!(alert_transition(None, Some(Missing)), Some(Missing));
        assert_eq!(alert_transition(Some(Missing), Some(Missing)), None);
        assert_eq!(alert_transition(Some(Missing), Some(Present)), Some(Present));
        assert_eq!(alert_transition(Some(Present), None), None);
    }

    #[test]
    fn start_transition_records_event_and_issues_stream_url() {
        let mut r = reconciler();
        let t0 = Utc::now();
        let first = r.apply(polled(false, None), t0).unwrap();
        assert!(first.event.is_none());
        assert!(r.stream_url().is_none());

        let t1 = t0 + Duration::milliseconds(1500);
        let second = r.apply(polled(true, Some(AlertStatus::Missing)), t1).unwrap();
        assert!(second.running_changed);
        assert!(second.stream_restarted);
        assert_eq!(second.event.unwrap().message, "missing");
        assert_eq!(r.history().len(), 1);

        let handle = r.stream_handle().unwrap();
        assert_eq!(handle.epoch, t1.timestamp_millis());
        assert_eq!(handle.mode, StreamMode::Primary);
        assert_eq!(r.stream_url().unwrap(), handle.url);
    }

    #[test]
    fn history_is_capped() {
        use AlertStatus::*;
        let mut r = reconciler();
        let alternating: Vec<_> = (0..25)
            .map(|i| Some(if i % 2 == 0 { Present } else { Missing }))
            .collect();
        assert_eq!(feed(&mut r, &alternating), 25);
        assert_eq!(r.history().len(), HISTORY_CAPACITY);
    }

    #[test]
    fn local_stop_clears_mirrors_until_next_poll() {
        let mut r = reconciler();
        let now = Utc::now();
        r.apply(polled(true, Some(AlertStatus::Present)), now);
        assert!(r.stream_url().is_some());

        r.local_stop();
        assert_eq!(r.session().alert_status, None);
        assert!(!r.session().running);
        assert!(r.stream_url().is_none());

        let outcome = r
            .apply(polled(true, Some(AlertStatus::Present)), now + Duration::seconds(2))
            .unwrap();
        assert!(outcome.stream_restarted);
        assert!(outcome.event.is_none());
        assert_eq!(r.session().alert_status, Some(AlertStatus::Present));
    }

    #[test]
    fn clear_history_keeps_transition_reference() {
        let mut r = reconciler();
        feed(&mut r, &[Some(AlertStatus::Missing)]);
        r.clear_history();
        assert!(r.history().is_empty());
        assert_eq!(feed(&mut r, &[Some(AlertStatus::Missing)]), 0);
    }

    #[test]
    fn nothing_applies_after_teardown() {
        let mut r = reconciler();
        assert_eq!(r.phase(), ReconcilePhase::Idle);
        r.apply(polled(false, None), Utc::now());
        assert_eq!(r.phase(), ReconcilePhase::Polling);
        r.teardown();
        assert!(r.apply(polled(true, Some(AlertStatus::Missing)), Utc::now()).is_none());
        assert!(!r.session().running);
        assert!(r.history().is_empty());
    }

    #[test]
    fn fallback_only_while_running() {
        let mut r = reconciler();
        let now = Utc::now();
        assert!(!r.on_primary_error(now));
        r.apply(polled(true, None), now);
        assert!(r.on_primary_error(now + Duration::milliseconds(10)));
        assert_eq!(r.stream_handle().unwrap().mode, StreamMode::Fallback);
        assert!(r.refresh_snapshot(now + Duration::milliseconds(310)));
        assert!(r.on_primary_load());
        assert_eq!(r.stream_handle().unwrap().mode, StreamMode::Primary);
    }
}
