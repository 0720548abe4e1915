//! Raw keystroke event types for the capture layer.
//!
//! Events carry only the key code, the state change and a millisecond
//! timestamp. Producing them is the job of an external keyboard hook.

use serde::{Deserialize, Serialize};

/// Integer key code as reported by the event source.
pub type KeyCode = u32;

/// Millisecond timestamp. Non-decreasing across a stream.
pub type TimestampMs = i64;

/// Whether a key went down or came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEventType {
    /// Key was pressed down
    Press,
    /// Key was released
    Release,
}

/// A single key state change.
///
/// Serialized as a `[key, type, time_ms]` triple so recorded sessions stay
/// compact and order-preserving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(KeyCode, KeyEventType, TimestampMs)",
    into = "(KeyCode, KeyEventType, TimestampMs)"
)]
pub struct KeyEvent {
    pub key: KeyCode,
    pub event_type: KeyEventType,
    pub time_ms: TimestampMs,
}

impl KeyEvent {
    pub fn new(key: KeyCode, event_type: KeyEventType, time_ms: TimestampMs) -> Self {
        Self {
            key,
            event_type,
            time_ms,
        }
    }

    pub fn press(key: KeyCode, time_ms: TimestampMs) -> Self {
        Self::new(key, KeyEventType::Press, time_ms)
    }

    pub fn release(key: KeyCode, time_ms: TimestampMs) -> Self {
        Self::new(key, KeyEventType::Release, time_ms)
    }
}

impl From<(KeyCode, KeyEventType, TimestampMs)> for KeyEvent {
    fn from((key, event_type, time_ms): (KeyCode, KeyEventType, TimestampMs)) -> Self {
        Self::new(key, event_type, time_ms)
    }
}

impl From<KeyEvent> for (KeyCode, KeyEventType, TimestampMs) {
    fn from(event: KeyEvent) -> Self {
        (event.key, event.event_type, event.time_ms)
    }
}

/// Anything that consumes keystroke events one at a time.
///
/// Implementations must tolerate a release with no matching press and
/// repeated presses with no release in between. Calls are expected to be
/// serialized by the caller.
pub trait KeyEventReceiver {
    fn on_key(&mut self, key: KeyCode, event_type: KeyEventType, time_ms: TimestampMs);
}

impl<R: KeyEventReceiver + ?Sized> KeyEventReceiver for &mut R {
    fn on_key(&mut self, key: KeyCode, event_type: KeyEventType, time_ms: TimestampMs) {
        (**self).on_key(key, event_type, time_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_as_triple() {
        let event = KeyEvent::press(65, 120);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"[65,"press",120]"#);

        let back: KeyEvent = serde_json::from_str(r#"[66,"release",170]"#).unwrap();
        assert_eq!(back, KeyEvent::release(66, 170));
    }

    #[test]
    fn test_receiver_by_reference() {
        struct Counter(usize);
        impl KeyEventReceiver for Counter {
            fn on_key(&mut self, _: KeyCode, _: KeyEventType, _: TimestampMs) {
                self.0 += 1;
            }
        }

        fn drive<R: KeyEventReceiver>(mut receiver: R) {
            receiver.on_key(1, KeyEventType::Press, 0);
            receiver.on_key(1, KeyEventType::Release, 10);
        }

        let mut counter = Counter(0);
        drive(&mut counter);
        assert_eq!(counter.0, 2);
    }
}
