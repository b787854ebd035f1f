//! Stream URL lifecycle.
//!
//! While the camera runs the viewer shows the MJPEG stream. The cache-busting
//! epoch only changes on a stopped -> running transition so re-renders never
//! reopen the connection. If the stream fails to load the lifecycle drops to a
//! snapshot flip-book that is re-issued on a fixed cadence until the primary
//! stream loads again.

use std::time::Duration;

use crate::session::CameraSession;

pub const STREAM_PATH: &str = "/camera/stream";
pub const SNAPSHOT_PATH: &str = "/camera/snapshot";

/// Snapshot refresh cadence while in fallback mode.
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_millis(300);

/// Where the viewer fetches frames from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoints {
    base_url: String,
    stream_path: String,
    snapshot_path: String,
    credentials: Vec<(&'static str, String)>,
}

impl StreamEndpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            stream_path: STREAM_PATH.to_string(),
            snapshot_path: SNAPSHOT_PATH.to_string(),
            credentials: Vec::new(),
        }
    }

    pub fn with_snapshot_path(mut self, path: &str) -> Self {
        self.snapshot_path = path.to_string();
        self
    }

    /// Image requests cannot carry headers, so credentials ride in the query.
    pub fn set_credentials(&mut self, edge_key: Option<&str>, token: Option<&str>) {
        self.credentials.clear();
        if let Some(key) = edge_key.filter(|k| !k.is_empty()) {
            self.credentials.push(("edge_key", key.to_string()));
        }
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.credentials.push(("token", token.to_string()));
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build(&self, path: &str, epoch: i64) -> String {
        let mut url = format!("{}{}?ts={}", self.base_url, path, epoch);
        for (key, value) in &self.credentials {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    pub fn stream_url(&self, epoch: i64) -> String {
        self.build(&self.stream_path, epoch)
    }

    pub fn snapshot_url(&self, epoch: i64) -> String {
        self.build(&self.snapshot_path, epoch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Primary,
    Fallback,
}

/// URL the viewer should display plus the epoch baked into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub url: String,
    pub epoch: i64,
    pub mode: StreamMode,
}

#[derive(Debug, Clone)]
pub struct StreamLifecycle {
    endpoints: StreamEndpoints,
    running: bool,
    primary_epoch: Option<i64>,
    fallback_epoch: Option<i64>,
    last_issued: i64,
}

impl StreamLifecycle {
    pub fn new(endpoints: StreamEndpoints) -> Self {
        Self {
            endpoints,
            running: false,
            primary_epoch: None,
            fallback_epoch: None,
            last_issued: i64::MIN,
        }
    }

    pub fn endpoints(&self) -> &StreamEndpoints {
        &self.endpoints
    }

    pub fn set_credentials(&mut self, edge_key: Option<&str>, token: Option<&str>) {
        self.endpoints.set_credentials(edge_key, token);
    }

    /// Epochs are wall-clock millis, bumped when the clock has not advanced.
    fn next_epoch(&mut self, now_ms: i64) -> i64 {
        let epoch = now_ms.max(self.last_issued.saturating_add(1));
        self.last_issued = epoch;
        epoch
    }

    /// Feed the latest running flag. Returns true when a fresh epoch was issued.
    pub fn observe_running(&mut self, running: bool, now_ms: i64) -> bool {
        let started = running && !self.running;
        self.running = running;
        if started {
            self.primary_epoch = Some(self.next_epoch(now_ms));
            self.fallback_epoch = None;
        } else if !running {
            self.primary_epoch = None;
            self.fallback_epoch = None;
        }
        started
    }

    /// Primary stream failed to load. Enter (or stay in) snapshot fallback.
    pub fn on_primary_error(&mut self, now_ms: i64) -> bool {
        if !self.running || self.fallback_epoch.is_some() {
            return false;
        }
        self.fallback_epoch = Some(self.next_epoch(now_ms));
        true
    }

    /// Primary stream loaded. Fallback ends immediately.
    pub fn on_primary_load(&mut self) -> bool {
        self.fallback_epoch.take().is_some()
    }

    /// Regenerate the snapshot URL. No-op outside fallback mode.
    pub fn refresh_snapshot(&mut self, now_ms: i64) -> bool {
        if self.fallback_epoch.is_none() {
            return false;
        }
        self.fallback_epoch = Some(self.next_epoch(now_ms));
        true
    }

    /// Local stop: forget every issued URL.
    pub fn stop(&mut self) {
        self.running = false;
        self.primary_epoch = None;
        self.fallback_epoch = None;
    }

    pub fn is_degraded(&self) -> bool {
        self.fallback_epoch.is_some()
    }

    pub fn handle(&self) -> Option<StreamHandle> {
        if !self.running {
            return None;
        }
        if let Some(epoch) = self.fallback_epoch {
            return Some(StreamHandle {
                url: self.endpoints.snapshot_url(epoch),
                epoch,
                mode: StreamMode::Fallback,
            });
        }
        self.primary_epoch.map(|epoch| StreamHandle {
            url: self.endpoints.stream_url(epoch),
            epoch,
            mode: StreamMode::Primary,
        })
    }

    /// Live stream URL for the current run, also while degraded.
    pub fn primary_url(&self) -> Option<String> {
        if !self.running {
            return None;
        }
        self.primary_epoch.map(|epoch| self.endpoints.stream_url(epoch))
    }

    /// URL to render for `session`; always `None` while it is not running.
    pub fn url_for(&self, session: &CameraSession) -> Option<String> {
        if !session.running {
            return None;
        }
        self.handle().map(|h| h.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_session(running: bool) -> CameraSession {
        CameraSession {
            running,
            ..CameraSession::default()
        }
    }

    fn lifecycle() -> StreamLifecycle {
        StreamLifecycle::new(StreamEndpoints::new("http://edge.local:8000/"))
    }

    #[test]
    fn stopped_session_has_no_url() {
        let mut stream = lifecycle();
        assert_eq!(stream.url_for(&running_session(false)), None);
        stream.observe_running(true, 1_000);
        assert_eq!(stream.url_for(&running_session(false)), None);
    }

    #[test]
    fn epoch_changes_only_on_start_transition() {
        let mut stream = lifecycle();
        assert!(stream.observe_running(true, 1_000));
        let first = stream.url_for(&running_session(true)).unwrap();
        assert_eq!(first, "http://edge.local:8000/camera/stream?ts=1000");

        assert!(!stream.observe_running(true, 2_500));
        assert_eq!(stream.url_for(&running_session(true)).unwrap(), first);

        stream.observe_running(false, 3_000);
        assert!(stream.handle().is_none());
        assert!(stream.observe_running(true, 4_000));
        assert_eq!(stream.handle().unwrap().epoch, 4_000);
    }

    #[test]
    fn epochs_are_strictly_increasing_even_with_a_stuck_clock() {
        let mut stream = lifecycle();
        stream.observe_running(true, 500);
        stream.observe_running(false, 500);
        stream.observe_running(true, 500);
        assert_eq!(stream.handle().unwrap().epoch, 501);
        stream.on_primary_error(400);
        assert_eq!(stream.handle().unwrap().epoch, 502);
    }

    #[test]
    fn primary_error_switches_to_snapshot_flip_book() {
        let mut stream = lifecycle();
        stream.observe_running(true, 1_000);
        assert!(stream.on_primary_error(1_100));
        let handle = stream.handle().unwrap();
        assert_eq!(handle.mode, StreamMode::Fallback);
        assert_eq!(handle.url, "http://edge.local:8000/camera/snapshot?ts=1100");

        assert!(!stream.on_primary_error(1_150));
        assert_eq!(
            stream.primary_url().as_deref(),
            Some("http://edge.local:8000/camera/stream?ts=1000")
        );
        assert!(stream.refresh_snapshot(1_400));
        assert_eq!(stream.handle().unwrap().epoch, 1_400);

        assert!(stream.on_primary_load());
        let handle = stream.handle().unwrap();
        assert_eq!(handle.mode, StreamMode::Primary);
        assert_eq!(handle.epoch, 1_000);
        assert!(!stream.refresh_snapshot(1_700));
    }

    #[test]
    fn errors_while_stopped_are_ignored() {
        let mut stream = lifecycle();
        assert!(!stream.on_primary_error(10));
        assert!(!stream.is_degraded());
    }

    #[test]
    fn stop_clears_fallback_and_primary() {
        let mut stream = lifecycle();
        stream.observe_running(true, 1_000);
        stream.on_primary_error(1_100);
        stream.stop();
        assert!(stream.handle().is_none());
        assert!(!stream.is_degraded());
    }

    #[test]
    fn credentials_are_appended_after_epoch() {
        let mut stream = lifecycle();
        stream.set_credentials(Some("k 1"), Some("tok"));
        stream.observe_running(true, 7);
        assert_eq!(
            stream.handle().unwrap().url,
            "http://edge.local:8000/camera/stream?ts=7&edge_key=k%201&token=tok"
        );
        stream.set_credentials(Some(""), None);
        assert_eq!(
            stream.handle().unwrap().url,
            "http://edge.local:8000/camera/stream?ts=7"
        );
    }
}
