//! Tracing layer that forwards station log events to the log broadcaster

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use gauge_station::{LogBroadcaster, LogCategory, LogMessage};
use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Crates that belong to this project (for filtering)
const PROJECT_CRATES: &[&str] = &[
    "gauge",
    "gauge_protocol",
    "gauge_detect",
    "gauge_station",
    "gauge_sim",
];

/// Runtime-adjustable broadcast level
///
/// Level encoding: 0=off, 1=error, 2=warn, 3=info, 4=debug, 5=trace
pub struct BroadcastLevel {
    level: AtomicU8,
}

impl BroadcastLevel {
    pub fn new(level: Option<Level>) -> Self {
        Self {
            level: AtomicU8::new(Self::level_to_u8(level)),
        }
    }

    pub fn set_level(&self, level: Option<Level>) {
        self.level.store(Self::level_to_u8(level), Ordering::Relaxed);
    }

    pub fn get_level(&self) -> Option<Level> {
        Self::u8_to_level(self.level.load(Ordering::Relaxed))
    }

    fn level_to_u8(level: Option<Level>) -> u8 {
        match level {
            None => 0,
            Some(Level::ERROR) => 1,
            Some(Level::WARN) => 2,
            Some(Level::INFO) => 3,
            Some(Level::DEBUG) => 4,
            Some(Level::TRACE) => 5,
        }
    }

    fn u8_to_level(value: u8) -> Option<Level> {
        match value {
            0 => None,
            1 => Some(Level::ERROR),
            2 => Some(Level::WARN),
            3 => Some(Level::INFO),
            4 => Some(Level::DEBUG),
            _ => Some(Level::TRACE),
        }
    }
}

/// Parse an operator-supplied level name; `off` disables broadcasting
pub fn parse_level(name: &str) -> Option<Option<Level>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" => Some(None),
        "error" => Some(Some(Level::ERROR)),
        "warn" => Some(Some(Level::WARN)),
        "info" => Some(Some(Level::INFO)),
        "debug" => Some(Some(Level::DEBUG)),
        "trace" => Some(Some(Level::TRACE)),
        _ => None,
    }
}

fn is_project_target(target: &str) -> bool {
    PROJECT_CRATES
        .iter()
        .any(|crate_name| target.starts_with(crate_name))
}

/// Filter that checks project crate membership and the broadcast level
pub struct ProjectCrateFilter {
    state: Arc<BroadcastLevel>,
}

impl ProjectCrateFilter {
    pub fn new(state: Arc<BroadcastLevel>) -> Self {
        Self { state }
    }
}

impl<S> tracing_subscriber::layer::Filter<S> for ProjectCrateFilter {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        if !is_project_target(meta.target()) {
            return false;
        }

        match self.state.get_level() {
            None => false,
            Some(filter_level) => *meta.level() <= filter_level,
        }
    }

    fn callsite_enabled(&self, meta: &'static Metadata<'static>) -> Interest {
        if is_project_target(meta.target()) {
            // Level is dynamic, so decide per event
            Interest::sometimes()
        } else {
            Interest::never()
        }
    }
}

/// Layer that turns events into [`LogMessage`]s on the broadcaster
pub struct BroadcastLayer {
    bus: Arc<LogBroadcaster>,
}

impl BroadcastLayer {
    pub fn new(bus: Arc<LogBroadcaster>) -> Self {
        Self { bus }
    }
}

impl<S: Subscriber> Layer<S> for BroadcastLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let category = visitor
            .source
            .as_deref()
            .map(LogCategory::from_source)
            .unwrap_or(LogCategory::System);

        self.bus
            .publish(LogMessage::now(category, visitor.message.unwrap_or_default()));
    }
}

/// Extracts the message and the optional `source` tag
#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    source: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "source" => self.source = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{:?}", value)),
            "source" => self.source = Some(format!("{:?}", value).trim_matches('"').to_string()),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    fn capture(level: Option<Level>, emit: impl FnOnce()) -> Vec<LogMessage> {
        let bus = Arc::new(LogBroadcaster::new(16));
        let mut sub = bus.subscribe();
        let state = Arc::new(BroadcastLevel::new(level));
        let subscriber = tracing_subscriber::registry()
            .with(BroadcastLayer::new(Arc::clone(&bus)).with_filter(ProjectCrateFilter::new(state)));

        tracing::subscriber::with_default(subscriber, emit);

        let mut out = Vec::new();
        while let Ok(message) = sub.rx.try_recv() {
            out.push(message);
        }
        out
    }

    #[test]
    fn test_source_tag_selects_category() {
        let messages = capture(Some(Level::INFO), || {
            tracing::info!(source = "scale", "Scale found on {}", "/dev/ttyUSB0");
            tracing::info!("Plain message");
            tracing::debug!(source = "arduino", "Too detailed");
        });

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].category, LogCategory::Scale);
        assert_eq!(messages[0].message, "Scale found on /dev/ttyUSB0");
        assert_eq!(messages[1].category, LogCategory::System);
    }

    #[test]
    fn test_off_broadcasts_nothing() {
        let messages = capture(None, || tracing::error!("boom"));
        assert!(messages.is_empty());
    }

    #[test]
    fn test_foreign_targets_are_ignored() {
        let messages = capture(Some(Level::TRACE), || {
            tracing::info!(target: "mio::poll", "registering");
        });
        assert!(messages.is_empty());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("off"), Some(None));
        assert_eq!(parse_level("DEBUG"), Some(Some(Level::DEBUG)));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_level_roundtrip() {
        let state = BroadcastLevel::new(Some(Level::WARN));
        assert_eq!(state.get_level(), Some(Level::WARN));
        state.set_level(None);
        assert_eq!(state.get_level(), None);
    }
}
