//! Log fan-out to live subscribers
//!
//! Every subscriber gets its own bounded queue. Publishing never blocks: a
//! full queue drops the message for that subscriber only, and a queue whose
//! receiver is gone is removed on the next publish.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Default queue length per subscriber
pub const DEFAULT_CAPACITY: usize = 100;

/// Which part of the station a log line is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Arduino,
    Scale,
    System,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Arduino => "arduino",
            LogCategory::Scale => "scale",
            LogCategory::System => "system",
        }
    }

    /// Map a `source` tag to a category; unknown tags are system messages
    pub fn from_source(source: &str) -> Self {
        match source {
            "arduino" => LogCategory::Arduino,
            "scale" => LogCategory::Scale,
            _ => LogCategory::System,
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One broadcast log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Local wall-clock time, `HH:MM:SS`
    pub time: String,
    pub message: String,
    #[serde(rename = "type")]
    pub category: LogCategory,
}

impl LogMessage {
    /// Stamp a message with the current local time
    pub fn now(category: LogCategory, message: impl Into<String>) -> Self {
        Self {
            time: chrono::Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
            category,
        }
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [{}] {}", self.time, self.category, self.message)
    }
}

/// Identifies a subscription for [`LogBroadcaster::unsubscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Receiving side of a subscription
#[derive(Debug)]
pub struct LogSubscription {
    pub id: SubscriberId,
    pub rx: mpsc::Receiver<LogMessage>,
}

/// Fans log messages out to every subscriber
#[derive(Debug)]
pub struct LogBroadcaster {
    subscribers: Mutex<Vec<(SubscriberId, mpsc::Sender<LogMessage>)>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl LogBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriberId, mpsc::Sender<LogMessage>)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new subscriber with its own bounded queue
    pub fn subscribe(&self) -> LogSubscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.capacity);
        self.lock().push((id, tx));
        LogSubscription { id, rx }
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.lock().retain(|(existing, _)| *existing != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `message` to every subscriber that has room
    ///
    /// Returns how many subscribers received it.
    pub fn publish(&self, message: LogMessage) -> usize {
        let mut delivered = 0;
        // No tracing in here: this runs inside the tracing layer
        self.lock().retain(|(_, tx)| match tx.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => false,
        });
        delivered
    }

    /// Convenience for publishing a freshly stamped message
    pub fn log(&self, category: LogCategory, message: impl Into<String>) -> usize {
        self.publish(LogMessage::now(category, message))
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_json_shape() {
        let message = LogMessage {
            time: "12:34:56".to_string(),
            message: "Scale found".to_string(),
            category: LogCategory::Scale,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"time": "12:34:56", "message": "Scale found", "type": "scale"})
        );
        assert_eq!(message.to_string(), "[12:34:56] [scale] Scale found");
    }

    #[test]
    fn test_time_format() {
        let message = LogMessage::now(LogCategory::System, "hello");
        let parts: Vec<&str> = message.time.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.len() == 2));
    }

    #[test]
    fn test_full_subscriber_drops_without_blocking() {
        let bus = LogBroadcaster::new(2);
        let mut slow = bus.subscribe();

        for i in 0..5 {
            bus.log(LogCategory::System, format!("line {}", i));
        }

        assert_eq!(slow.rx.try_recv().unwrap().message, "line 0");
        assert_eq!(slow.rx.try_recv().unwrap().message, "line 1");
        assert!(slow.rx.try_recv().is_err());
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_each_subscriber_has_own_queue() {
        let bus = LogBroadcaster::new(1);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.log(LogCategory::Arduino, "a"), 2);
        first.rx.try_recv().unwrap();
        assert_eq!(bus.log(LogCategory::Arduino, "b"), 1);

        assert_eq!(first.rx.try_recv().unwrap().message, "b");
        assert_eq!(second.rx.try_recv().unwrap().message, "a");
    }

    #[test]
    fn test_unsubscribe_and_closed_receivers() {
        let bus = LogBroadcaster::default();
        let kept = bus.subscribe();
        let dropped = bus.subscribe();
        let removed = bus.subscribe();

        bus.unsubscribe(removed.id);
        drop(dropped);
        assert_eq!(bus.log(LogCategory::Scale, "x"), 1);
        assert_eq!(bus.subscriber_count(), 1);
        drop(kept);
    }

    #[test]
    fn test_category_from_source() {
        assert_eq!(LogCategory::from_source("arduino"), LogCategory::Arduino);
        assert_eq!(LogCategory::from_source("scale"), LogCategory::Scale);
        assert_eq!(LogCategory::from_source("anything"), LogCategory::System);
    }
}
