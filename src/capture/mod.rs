//! Keystroke capture types and recorded sessions.
//!
//! Acquiring events from the operating system is left to an external hook;
//! this module defines the event shape, the receiver contract and the
//! replayable [`CaptureLog`].

pub mod log;
pub mod types;

// Re-export commonly used types
pub use log::CaptureLog;
pub use types::{KeyCode, KeyEvent, KeyEventReceiver, KeyEventType, TimestampMs};
