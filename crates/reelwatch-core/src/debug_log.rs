use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use reelwatch_detect::ContentKind;

use crate::host::TabId;

/// Maximum number of events retained in the ring buffer.
const EVENT_LOG_CAPACITY: usize = 200;

/// A typed event from the watch detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorEvent {
    Armed {
        tab: TabId,
        url: String,
        kind: ContentKind,
    },
    Tick {
        tab: TabId,
        remaining_secs: u64,
    },
    TornDown {
        tab: TabId,
        reason: TeardownReason,
    },
    Extracted {
        raw_title: String,
        title: String,
    },
    ExtractionFailed {
        tab: TabId,
    },
    Submitted {
        title: String,
    },
    Duplicate {
        title: String,
    },
    SubmitFailed {
        title: String,
        message: String,
    },
}

/// Why a watch session ended without reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// A new session was armed.
    Superseded,
    /// The user activated a different tab.
    SwitchedAway,
    /// The watched tab is on a different URL.
    UrlChanged,
    /// The watched tab no longer exists.
    TabClosed,
    /// The browser did not answer a tab lookup.
    HostError,
}

impl std::fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Superseded => "superseded",
            Self::SwitchedAway => "switched away",
            Self::UrlChanged => "url changed",
            Self::TabClosed => "tab closed",
            Self::HostError => "host error",
        };
        f.write_str(s)
    }
}

/// A timestamped event entry.
pub type EventEntry = (DateTime<Utc>, DetectorEvent);

/// Bounded ring buffer of detector events.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<EventEntry>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
        }
    }

    /// Push a new event, evicting the oldest if at capacity.
    pub fn push(&mut self, event: DetectorEvent) {
        if self.entries.len() >= EVENT_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back((Utc::now(), event));
    }

    /// Return a snapshot of all entries (newest last).
    pub fn snapshot(&self) -> Vec<EventEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Thread-safe handle to the event log.
pub type SharedEventLog = Arc<Mutex<EventLog>>;

/// Create a new shared event log.
pub fn shared_event_log() -> SharedEventLog {
    Arc::new(Mutex::new(EventLog::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut log = EventLog::new();
        for i in 0..(EVENT_LOG_CAPACITY + 5) {
            log.push(DetectorEvent::Submitted {
                title: format!("Title {i}"),
            });
        }
        assert_eq!(log.len(), EVENT_LOG_CAPACITY);

        let snapshot = log.snapshot();
        assert_eq!(
            snapshot[0].1,
            DetectorEvent::Submitted {
                title: "Title 5".into()
            }
        );
    }
}
