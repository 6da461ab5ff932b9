use crate::source::classifier::LogRecord;
use crate::watcher::stats::Statistics;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Everything a supervisor reports to the outside world.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchEvent {
    Started,
    Stopped,
    Restarted,
    /// Full retained history, sent each time the watcher comes up
    Snapshot {
        records: Vec<LogRecord>,
        stats: Statistics,
    },
    /// Records accepted by one watch cycle
    Update {
        records: Vec<LogRecord>,
        stats: Statistics,
    },
    Rotated {
        path: PathBuf,
    },
    Stalled,
    Error {
        message: String,
    },
}

impl WatchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WatchEvent::Started => "started",
            WatchEvent::Stopped => "stopped",
            WatchEvent::Restarted => "restarted",
            WatchEvent::Snapshot { .. } => "snapshot",
            WatchEvent::Update { .. } => "update",
            WatchEvent::Rotated { .. } => "rotated",
            WatchEvent::Stalled => "stalled",
            WatchEvent::Error { .. } => "error",
        }
    }
}

/// Receiver side of watcher events. Must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: WatchEvent);
}

/// Fan-out of watcher events to any number of subscribers.
///
/// Subscribers that fall behind by more than `capacity` events lose the oldest.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WatchEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: WatchEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}
