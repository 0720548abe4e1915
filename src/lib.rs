//! Keystroke Dynamics - typing-rhythm profiles for authentication.
//!
//! This library turns raw key press/release timing into per-key timing
//! profiles and scores how alike two profiles are.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Keystroke Dynamics                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │ Event hook  │──▶│  Feature    │──▶│  Feature    │        │
//! │  │ (external)  │   │  Extractor  │   │  Tree       │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │         │                 ▲                 │               │
//! │         ▼                 │                 ▼               │
//! │  ┌─────────────┐          │          ┌─────────────┐        │
//! │  │ Capture Log │──replay──┘          │  Gaussian   │        │
//! │  │             │                     │  Scoring    │        │
//! │  └─────────────┘                     └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use keystroke_dynamics::capture::{CaptureLog, KeyEvent};
//! use keystroke_dynamics::core::{compare_profiles, FeatureExtractor, DEFAULT_MIN_SAMPLES};
//!
//! let log = CaptureLog::from(vec![
//!     KeyEvent::press(65, 0),
//!     KeyEvent::release(65, 80),
//!     KeyEvent::press(66, 120),
//!     KeyEvent::release(66, 170),
//! ]);
//!
//! let profile = log.feed(FeatureExtractor::new()).extract_features();
//! assert_eq!(profile.leaf_count(), 4);
//!
//! // a single sample per key is not enough to model it
//! assert!(compare_profiles(&profile, &profile, DEFAULT_MIN_SAMPLES).is_err());
//! ```

pub mod capture;
pub mod config;
pub mod core;
pub mod store;

// Re-export key types at crate root for convenience
pub use capture::{CaptureLog, KeyCode, KeyEvent, KeyEventReceiver, KeyEventType, TimestampMs};
pub use config::{Config, ConfigError};
pub use crate::core::{
    compare_profiles, fit_models, score_observation, Comparison, Feature, FeatureExtractor,
    FeatureTree, GaussianModel, ModelError, ScoreError, TimingCategory, TreeError,
};
pub use store::{StoreError, Versioned};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
