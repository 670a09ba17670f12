//! Human-readable rendering of raw device bytes for log output

use std::fmt::Write;

use crate::dimension::{SensorFrame, FRAME_LEN};

/// Render raw bytes as hex, e.g. `[0x2D 0x0B 0x14 0x7B]`
pub fn hex_string(data: &[u8]) -> String {
    let parts: Vec<String> = data.iter().map(|b| format!("0x{:02X}", b)).collect();
    format!("[{}]", parts.join(" "))
}

/// Render bytes as text, escaping control characters and non-ASCII bytes
pub fn escaped_text(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &b in data {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            32..=126 => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{:02X}", b);
            }
        }
    }
    out
}

/// Collect every well-formed sensor frame found at any offset
pub fn scan_sensor_frames(data: &[u8]) -> Vec<SensorFrame> {
    data.windows(FRAME_LEN).filter_map(SensorFrame::decode).collect()
}

/// Summarise sensor frames, e.g. `sensor data: {WIDTH=20, HEIGHT=10}`
pub fn describe_sensor_frames(frames: &[SensorFrame]) -> Option<String> {
    if frames.is_empty() {
        return None;
    }

    let parts: Vec<String> = frames
        .iter()
        .map(|f| format!("{}={}", f.sensor.label(), f.value))
        .collect();
    Some(format!("sensor data: {{{}}}", parts.join(", ")))
}

/// Format received bytes for a log line
///
/// Printable content is shown quoted with escapes, embedded sensor frames
/// are decoded, and input with neither falls back to hex. The byte count is
/// always appended.
pub fn format_data_for_log(data: &[u8]) -> String {
    if data.is_empty() {
        return "no data".to_string();
    }

    let has_text = data
        .iter()
        .any(|b| (32..=126).contains(b) || matches!(b, b'\n' | b'\r' | b'\t'));

    let mut parts = Vec::new();
    if has_text {
        parts.push(format!("\"{}\"", escaped_text(data)));
    }
    if let Some(decoded) = describe_sensor_frames(&scan_sensor_frames(data)) {
        parts.push(decoded);
    }
    if parts.is_empty() {
        parts.push(hex_string(data));
    }

    format!("{} ({} bytes)", parts.join(" + "), data.len())
}
