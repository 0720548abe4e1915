//! Append-only record of a capture session.
//!
//! A [`CaptureLog`] stores raw events in arrival order and can replay them
//! into any [`KeyEventReceiver`], so a recorded session can stand in for a
//! live event source in tests or offline analysis.

use crate::capture::types::{KeyCode, KeyEvent, KeyEventReceiver, KeyEventType, TimestampMs};
use crate::store::Versioned;
use serde::{Deserialize, Serialize};

/// Ordered raw keystroke events from one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptureLog {
    events: Vec<KeyEvent>,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&mut self, event: KeyEvent) {
        self.events.push(event);
    }

    /// Recorded events in original order.
    pub fn events(&self) -> &[KeyEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Span between the first and last event, in milliseconds.
    pub fn duration_ms(&self) -> TimestampMs {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.time_ms - first.time_ms,
            _ => 0,
        }
    }

    /// Replay every recorded event, in order, into `receiver` and hand it back.
    pub fn feed<R: KeyEventReceiver>(&self, mut receiver: R) -> R {
        for event in &self.events {
            receiver.on_key(event.key, event.event_type, event.time_ms);
        }
        receiver
    }
}

impl KeyEventReceiver for CaptureLog {
    fn on_key(&mut self, key: KeyCode, event_type: KeyEventType, time_ms: TimestampMs) {
        self.push(KeyEvent::new(key, event_type, time_ms));
    }
}

impl From<Vec<KeyEvent>> for CaptureLog {
    fn from(events: Vec<KeyEvent>) -> Self {
        Self { events }
    }
}

impl FromIterator<KeyEvent> for CaptureLog {
    fn from_iter<I: IntoIterator<Item = KeyEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl Extend<KeyEvent> for CaptureLog {
    fn extend<I: IntoIterator<Item = KeyEvent>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}

impl Versioned for CaptureLog {
    const KIND: &'static str = "keystroke_capture";
    const VERSION: u32 = 1;
    const FILE_EXTENSION: &'static str = "keypresses";
}
