use chrono::{DateTime, Local, TimeZone, Utc};
use infaq_api::CameraStatusResponse;
use infaq_core::{AlertEvent, AlertStatus, NormalizedRect, StreamMode};
use infaq_monitor::{LinkState, MonitorSnapshot};

pub fn print_roi(rect: &NormalizedRect, frame: Option<(u32, u32)>) {
    println!("ROI: {rect}");
    if let Some((fw, fh)) = frame {
        match rect.pixel_bounds(fw, fh) {
            Some((x1, y1, x2, y2)) => println!("  pixels ({fw}x{fh}): ({x1},{y1}) - ({x2},{y2})"),
            None => println!("  pixels ({fw}x{fh}): too small to use"),
        }
    }
}

fn alert_label(status: Option<AlertStatus>) -> &'static str {
    match status {
        Some(AlertStatus::Present) => "box present",
        Some(AlertStatus::Missing) => "BOX MISSING",
        None => "-",
    }
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

pub fn format_event(event: &AlertEvent) -> String {
    format!("[{}] {}", local_time(event.timestamp), event.message)
}

pub fn print_status(status: &CameraStatusResponse) {
    println!("running:      {}", status.running);
    println!("alert:        {}", alert_label(status.alert_status));
    if let Some(ready) = status.stream_ready {
        println!("stream ready: {ready}");
    }
    if let Some(source) = &status.source {
        let detail = match (status.index, status.path.as_deref()) {
            (_, Some(path)) if !path.is_empty() => path.to_string(),
            (Some(index), _) => format!("device {index}"),
            _ => String::new(),
        };
        println!("source:       {source} {detail}");
    }
    if let Some(ts) = status.last_frame_ts {
        let millis = (ts * 1000.0) as i64;
        if let Some(at) = Utc.timestamp_millis_opt(millis).single() {
            println!("last frame:   {}", local_time(at));
        }
    }
    if let Some(err) = status.last_cap_error.as_deref().filter(|e| !e.is_empty()) {
        println!("capture err:  {err}");
    }
    if let Some(id) = status.masjid_id {
        println!("masjid:       #{id}");
    }
}

/// One status line for `infaq watch`.
pub fn format_snapshot(snapshot: &MonitorSnapshot) -> String {
    let link = match &snapshot.link {
        LinkState::Connecting => "connecting".to_string(),
        LinkState::Online => "online".to_string(),
        LinkState::Unreachable(detail) => format!("unreachable ({detail})"),
        LinkState::Unauthenticated => "logged out".to_string(),
    };
    let stream = match &snapshot.stream {
        None => "no stream".to_string(),
        Some(h) if h.mode == StreamMode::Primary => format!("live ts={}", h.epoch),
        Some(h) => format!("snapshots ts={}", h.epoch),
    };
    format!(
        "{link} | camera {} | {} | {stream} | events {}",
        if snapshot.session.running { "on" } else { "off" },
        alert_label(snapshot.session.alert_status),
        snapshot.history.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_line_carries_message() {
        let event = AlertEvent::new(AlertStatus::Missing, Utc::now());
        assert!(format_event(&event).ends_with("] missing"));
    }

    #[test]
    fn alert_labels() {
        assert_eq!(alert_label(None), "-");
        assert_eq!(alert_label(Some(AlertStatus::Missing)), "BOX MISSING");
    }
}
