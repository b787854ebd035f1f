use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Number of alert events kept in the operator-visible history.
pub const HISTORY_CAPACITY: usize = 10;

/// Kind of capture source the detector reads from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    #[default]
    Webcam,
    Video,
    Ipcam,
}

impl SourceMode {
    pub const ALL: [SourceMode; 3] = [Self::Webcam, Self::Video, Self::Ipcam];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webcam => "webcam",
            Self::Video => "video",
            Self::Ipcam => "ipcam",
        }
    }
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceMode {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webcam" => Ok(Self::Webcam),
            "video" => Ok(Self::Video),
            "ipcam" => Ok(Self::Ipcam),
            other => Err(SourceError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SourceError {
    #[error("unknown source mode: {0}")]
    UnknownMode(String),
    #[error("webcam device index must be a non-negative integer (got {0:?})")]
    InvalidIndex(String),
    #[error("video source needs a file path")]
    EmptyVideoPath,
    #[error("IP camera URL must not be empty")]
    EmptyIpcamUrl,
    #[error("source mode {0} is not enabled")]
    ModeDisabled(SourceMode),
}

/// Fully specified capture source, ready to be sent with a start command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    Webcam { index: u32 },
    Video { path: String, looped: bool },
    Ipcam { url: String },
}

impl SourceDescriptor {
    /// Build a descriptor from the operator's raw input for `mode`.
    ///
    /// `source_ref` is the device index for webcams, the file path for videos,
    /// and the stream URL for IP cameras. An empty webcam reference means
    /// device 0.
    pub fn from_input(mode: SourceMode, source_ref: &str, looped: bool) -> Result<Self, SourceError> {
        let source_ref = source_ref.trim();
        match mode {
            SourceMode::Webcam => {
                if source_ref.is_empty() {
                    return Ok(Self::Webcam { index: 0 });
                }
                source_ref
                    .parse::<u32>()
                    .map(|index| Self::Webcam { index })
                    .map_err(|_| SourceError::InvalidIndex(source_ref.to_string()))
            }
            SourceMode::Video if source_ref.is_empty() => Err(SourceError::EmptyVideoPath),
            SourceMode::Video => Ok(Self::Video {
                path: source_ref.to_string(),
                looped,
            }),
            SourceMode::Ipcam if source_ref.is_empty() => Err(SourceError::EmptyIpcamUrl),
            SourceMode::Ipcam => Ok(Self::Ipcam {
                url: source_ref.to_string(),
            }),
        }
    }

    pub fn mode(&self) -> SourceMode {
        match self {
            Self::Webcam { .. } => SourceMode::Webcam,
            Self::Video { .. } => SourceMode::Video,
            Self::Ipcam { .. } => SourceMode::Ipcam,
        }
    }

    /// Operator-facing reference string (index, path or URL).
    pub fn source_ref(&self) -> String {
        match self {
            Self::Webcam { index } => index.to_string(),
            Self::Video { path, .. } => path.clone(),
            Self::Ipcam { url } => url.clone(),
        }
    }

    /// Query parameters for `POST /camera/start`. IP camera URLs travel in `path`.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("source", self.mode().as_str().to_string())];
        match self {
            Self::Webcam { index } => pairs.push(("index", index.to_string())),
            Self::Video { path, looped } => {
                pairs.push(("path", path.clone()));
                pairs.push(("loop", looped.to_string()));
            }
            Self::Ipcam { url } => pairs.push(("path", url.clone())),
        }
        pairs
    }
}

/// Server-reported state of the donation box inside the ROI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Present,
    Missing,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Missing => "missing",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locally displayed camera session.
///
/// `mode`/`source_ref` are operator inputs. `running`/`alert_status` mirror the
/// server and are overwritten wholesale on every successful poll.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CameraSession {
    pub mode: SourceMode,
    pub source_ref: String,
    pub running: bool,
    pub alert_status: Option<AlertStatus>,
}

/// Immutable record of an alert-state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub status: AlertStatus,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl AlertEvent {
    pub fn new(status: AlertStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status,
            timestamp,
            message: status.as_str().to_string(),
        }
    }
}

/// Bounded FIFO of alert events; the oldest entry is evicted first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertHistory {
    entries: VecDeque<AlertEvent>,
    capacity: usize,
}

impl Default for AlertHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl AlertHistory {
    /// A zero capacity is bumped to one so the latest event is always visible.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: AlertEvent) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&AlertEvent> {
        self.entries.back()
    }

    /// Events in the order they were applied, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &AlertEvent> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<AlertEvent> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipcam_requires_url() {
        assert_eq!(
            SourceDescriptor::from_input(SourceMode::Ipcam, "   ", true),
            Err(SourceError::EmptyIpcamUrl)
        );
        let desc =
            SourceDescriptor::from_input(SourceMode::Ipcam, "rtsp://10.0.0.5/live", true).unwrap();
        assert_eq!(
            desc.query_pairs(),
            vec![
                ("source", "ipcam".to_string()),
                ("path", "rtsp://10.0.0.5/live".to_string()),
            ]
        );
    }

    #[test]
    fn webcam_defaults_to_device_zero() {
        assert_eq!(
            SourceDescriptor::from_input(SourceMode::Webcam, "", false).unwrap(),
            SourceDescriptor::Webcam { index: 0 }
        );
        assert_eq!(
            SourceDescriptor::from_input(SourceMode::Webcam, "2", false)
                .unwrap()
                .query_pairs(),
            vec![("source", "webcam".to_string()), ("index", "2".to_string())]
        );
        assert!(matches!(
            SourceDescriptor::from_input(SourceMode::Webcam, "-1", false),
            Err(SourceError::InvalidIndex(_))
        ));
    }

    #[test]
    fn video_carries_path_and_loop_flag() {
        let desc = SourceDescriptor::from_input(SourceMode::Video, "/srv/box.mp4", false).unwrap();
        assert_eq!(desc.source_ref(), "/srv/box.mp4");
        assert_eq!(
            desc.query_pairs(),
            vec![
                ("source", "video".to_string()),
                ("path", "/srv/box.mp4".to_string()),
                ("loop", "false".to_string()),
            ]
        );
        assert_eq!(
            SourceDescriptor::from_input(SourceMode::Video, "", true),
            Err(SourceError::EmptyVideoPath)
        );
    }

    #[test]
    fn source_mode_parses_case_insensitively() {
        assert_eq!("IPCAM".parse::<SourceMode>().unwrap(), SourceMode::Ipcam);
        assert!("usb".parse::<SourceMode>().is_err());
    }

    #[test]
    fn alert_status_uses_snake_case_on_the_wire() {
        let parsed: Option<AlertStatus> = serde_json::from_str(r#""missing""#).unwrap();
        assert_eq!(parsed, Some(AlertStatus::Missing));
        let parsed: Option<AlertStatus> = serde_json::from_str("null").unwrap();
        assert_eq!(parsed, None);
    }

    #[test]
    fn history_evicts_oldest_first() {
        let mut history = AlertHistory::default();
        let base = Utc::now();
        for i in 0..11 {
            let status = if i % 2 == 0 {
                AlertStatus::Present
            } else {
                AlertStatus::Missing
            };
            history.push(AlertEvent::new(status, base + chrono::Duration::seconds(i)));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        let first = history.iter().next().unwrap();
        assert_eq!(first.timestamp, base + chrono::Duration::seconds(1));
        assert_eq!(
            history.latest().unwrap().timestamp,
            base + chrono::Duration::seconds(10)
        );

        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn event_message_names_the_status() {
        let event = AlertEvent::new(AlertStatus::Missing, Utc::now());
        assert_eq!(event.message, "missing");
    }
}
