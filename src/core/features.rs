//! Timing feature extraction from keystroke events.
//!
//! The extractor consumes press/release events one at a time and keeps,
//! per key, the dwell times (how long the key was held) and the flight
//! times into and out of the key. Intervals at or above the timing
//! threshold are treated as pauses and never reach the sequences.

use crate::capture::types::{KeyCode, KeyEventReceiver, KeyEventType, TimestampMs};
use crate::core::tree::Feature;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// Intervals at or above this many milliseconds are discarded.
pub const DEFAULT_TIMING_THRESHOLD_MS: TimestampMs = 500;

/// Name of the root composite produced by [`FeatureExtractor::extract_features`].
pub const PROFILE_ROOT: &str = "keystroke_features";

/// The per-key timing sequences the extractor accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingCategory {
    /// Press to release of the same key
    Dwell,
    /// Interval from the previous key into this key's press
    FlightBefore,
    /// Interval from this key to the next key's press
    FlightAfter,
}

impl TimingCategory {
    pub const ALL: [TimingCategory; 3] = [
        TimingCategory::Dwell,
        TimingCategory::FlightBefore,
        TimingCategory::FlightAfter,
    ];

    /// Name of the composite feature holding this category.
    pub fn feature_name(self) -> &'static str {
        match self {
            TimingCategory::Dwell => "dwell_times",
            TimingCategory::FlightBefore => "flight_times_before",
            TimingCategory::FlightAfter => "flight_times_after",
        }
    }
}

impl fmt::Display for TimingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.feature_name())
    }
}

impl FromStr for TimingCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "dwell" | "dwell_times" => Ok(TimingCategory::Dwell),
            "flight_before" | "flight_times_before" => Ok(TimingCategory::FlightBefore),
            "flight_after" | "flight_times_after" => Ok(TimingCategory::FlightAfter),
            other => Err(format!("unknown timing category '{other}'")),
        }
    }
}

/// Counters describing what the extractor kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub events: u64,
    pub presses: u64,
    pub releases: u64,
    /// Releases with no observed press (capture started mid-press)
    pub orphan_releases: u64,
    pub dwell_samples: u64,
    pub flight_samples: u64,
    /// Dwell intervals at or above the threshold
    pub discarded_dwell: u64,
    /// Flight intervals at or above the threshold
    pub discarded_flight: u64,
}

impl ExtractionStats {
    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        format!(
            "Extraction Statistics:\n\
             - Events processed: {} ({} presses, {} releases)\n\
             - Dwell samples kept: {}\n\
             - Flight samples kept: {}\n\
             - Intervals over threshold: {} dwell, {} flight\n\
             - Releases without press: {}",
            self.events,
            self.presses,
            self.releases,
            self.dwell_samples,
            self.flight_samples,
            self.discarded_dwell,
            self.discarded_flight,
            self.orphan_releases
        )
    }
}

/// Accumulates per-key timing sequences from a keystroke stream.
///
/// The only way to feed it is [`KeyEventReceiver::on_key`]. Calls must be
/// serialized by the caller and arrive in non-decreasing time order.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    timing_threshold: TimestampMs,
    categories: Vec<TimingCategory>,
    last_press_time: Option<TimestampMs>,
    last_pressed_key: Option<KeyCode>,
    /// Release time of `last_pressed_key`, once it has come up after its press
    last_release_time: Option<TimestampMs>,
    /// Keys currently held down and when they went down
    pending_press: HashMap<KeyCode, TimestampMs>,
    dwell_times: BTreeMap<KeyCode, Vec<f64>>,
    flight_times_before: BTreeMap<KeyCode, Vec<f64>>,
    flight_times_after: BTreeMap<KeyCode, Vec<f64>>,
    stats: ExtractionStats,
}

impl FeatureExtractor {
    /// Create an extractor with the default 500 ms threshold.
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_TIMING_THRESHOLD_MS)
    }

    pub fn with_threshold(timing_threshold: TimestampMs) -> Self {
        Self {
            timing_threshold,
            categories: TimingCategory::ALL.to_vec(),
            last_press_time: None,
            last_pressed_key: None,
            last_release_time: None,
            pending_press: HashMap::new(),
            dwell_times: BTreeMap::new(),
            flight_times_before: BTreeMap::new(),
            flight_times_after: BTreeMap::new(),
            stats: ExtractionStats::default(),
        }
    }

    /// Restrict which categories [`FeatureExtractor::extract_features`] emits.
    /// Accumulation is unaffected.
    pub fn with_categories(mut self, categories: &[TimingCategory]) -> Self {
        self.categories.clear();
        for category in categories {
            if !self.categories.contains(category) {
                self.categories.push(*category);
            }
        }
        self
    }

    pub fn timing_threshold(&self) -> TimestampMs {
        self.timing_threshold
    }

    pub fn categories(&self) -> &[TimingCategory] {
        &self.categories
    }

    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    /// Keys currently held down.
    pub fn held_keys(&self) -> usize {
        self.pending_press.len()
    }

    pub fn dwell_times(&self) -> &BTreeMap<KeyCode, Vec<f64>> {
        &self.dwell_times
    }

    pub fn flight_times_before(&self) -> &BTreeMap<KeyCode, Vec<f64>> {
        &self.flight_times_before
    }

    pub fn flight_times_after(&self) -> &BTreeMap<KeyCode, Vec<f64>> {
        &self.flight_times_after
    }

    /// Accumulated sequences for one category.
    pub fn timings(&self, category: TimingCategory) -> &BTreeMap<KeyCode, Vec<f64>> {
        match category {
            TimingCategory::Dwell => &self.dwell_times,
            TimingCategory::FlightBefore => &self.flight_times_before,
            TimingCategory::FlightAfter => &self.flight_times_after,
        }
    }

    /// One composite for `category`, one leaf per key in ascending key order.
    pub fn extract(&self, category: TimingCategory) -> Feature {
        let leaves = self
            .timings(category)
            .iter()
            .map(|(key, samples)| Feature::leaf(key.to_string(), samples.clone()));
        Feature::composite(category.feature_name(), leaves)
    }

    /// The full profile: a root composite holding each configured category.
    pub fn extract_features(&self) -> Feature {
        let categories = self.categories.iter().map(|&c| self.extract(c));
        Feature::composite(PROFILE_ROOT, categories)
    }

    fn on_press(&mut self, key: KeyCode, time_ms: TimestampMs) {
        self.stats.presses += 1;

        if let (Some(previous_key), Some(press_time)) = (self.last_pressed_key, self.last_press_time) {
            // Measure from the previous key's release when it came up first,
            // otherwise the presses overlap and we measure press to press.
            let reference = self.last_release_time.unwrap_or(press_time);
            let flight = time_ms - reference;
            if flight < self.timing_threshold {
                self.flight_times_before
                    .entry(key)
                    .or_default()
                    .push(flight as f64);
                self.flight_times_after
                    .entry(previous_key)
                    .or_default()
                    .push(flight as f64);
                self.stats.flight_samples += 1;
            } else {
                trace!(key, flight, "flight interval over threshold");
                self.stats.discarded_flight += 1;
            }
        }

        // A repeated press before release overwrites the pending timestamp.
        self.pending_press.insert(key, time_ms);
        self.last_press_time = Some(time_ms);
        self.last_pressed_key = Some(key);
        self.last_release_time = None;
    }

    fn on_release(&mut self, key: KeyCode, time_ms: TimestampMs) {
        self.stats.releases += 1;

        let Some(press_time) = self.pending_press.remove(&key) else {
            trace!(key, "release without observed press");
            self.stats.orphan_releases += 1;
            return;
        };

        if self.last_pressed_key == Some(key) {
            self.last_release_time = Some(time_ms);
        }

        let dwell = time_ms - press_time;
        if dwell < self.timing_threshold {
            self.dwell_times.entry(key).or_default().push(dwell as f64);
            self.stats.dwell_samples += 1;
        } else {
            trace!(key, dwell, "dwell interval over threshold");
            self.stats.discarded_dwell += 1;
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyEventReceiver for FeatureExtractor {
    fn on_key(&mut self, key: KeyCode, event_type: KeyEventType, time_ms: TimestampMs) {
        self.stats.events += 1;
        match event_type {
            KeyEventType::Press => self.on_press(key, time_ms),
            KeyEventType::Release => self.on_release(key, time_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::KeyEventType::{Press, Release};

    fn run(events: &[(KeyCode, KeyEventType, TimestampMs)]) -> FeatureExtractor {
        let mut extractor = FeatureExtractor::new();
        for &(key, event_type, time) in events {
            extractor.on_key(key, event_type, time);
        }
        extractor
    }

    #[test]
    fn test_two_key_sequence() {
        let extractor = run(&[(65, Press, 0), (65, Release, 80), (66, Press, 120), (66, Release, 170)]);

        assert_eq!(extractor.dwell_times()[&65], vec![80.0]);
        assert_eq!(extractor.dwell_times()[&66], vec![50.0]);
        assert_eq!(extractor.flight_times_before()[&66], vec![40.0]);
        assert_eq!(extractor.flight_times_after()[&65], vec![40.0]);
        assert_eq!(extractor.flight_times_before().len(), 1);
        assert_eq!(extractor.flight_times_after().len(), 1);
    }

    #[test]
    fn test_dwell_threshold_is_strict() {
        let extractor = run(&[(1, Press, 0), (1, Release, 500), (2, Press, 1000), (2, Release, 1499)]);

        assert!(!extractor.dwell_times().contains_key(&1));
        assert_eq!(extractor.dwell_times()[&2], vec![499.0]);
        assert_eq!(extractor.stats().discarded_dwell, 1);
    }

    #[test]
    fn test_flight_threshold_is_strict() {
        // 1 comes up at 10, 2 goes down at 510: exactly at threshold
        // 2 comes up at 520, 3 goes down at 1019: one below
        let extractor = run(&[
            (1, Press, 0),
            (1, Release, 10),
            (2, Press, 510),
            (2, Release, 520),
            (3, Press, 1019),
        ]);

        assert!(!extractor.flight_times_before().contains_key(&2));
        assert_eq!(extractor.flight_times_before()[&3], vec![499.0]);
        assert_eq!(extractor.flight_times_after()[&2], vec![499.0]);
        assert!(!extractor.flight_times_after().contains_key(&1));
    }

    #[test]
    fn test_state_advances_after_long_pause() {
        let extractor = run(&[(1, Press, 0), (2, Press, 5000), (3, Press, 5100)]);

        assert_eq!(extractor.flight_times_before()[&3], vec![100.0]);
        assert_eq!(extractor.flight_times_after()[&2], vec![100.0]);
        assert!(!extractor.flight_times_after().contains_key(&1));
    }

    #[test]
    fn test_orphan_release_is_ignored() {
        let extractor = run(&[(7, Release, 30), (8, Press, 40), (8, Release, 90)]);

        assert!(!extractor.dwell_times().contains_key(&7));
        assert_eq!(extractor.dwell_times()[&8], vec![50.0]);
        assert_eq!(extractor.stats().orphan_releases, 1);
        assert_eq!(extractor.stats().events, 3);
    }

    #[test]
    fn test_repeated_press_measures_from_latest() {
        let extractor = run(&[(9, Press, 0), (9, Press, 30), (9, Press, 60), (9, Release, 100)]);

        assert_eq!(extractor.dwell_times()[&9], vec![40.0]);
        assert_eq!(extractor.flight_times_before()[&9], vec![30.0, 30.0]);
        assert_eq!(extractor.held_keys(), 0);
    }

    #[test]
    fn test_overlapping_presses_measure_press_to_press() {
        // 2 goes down while 1 is still held
        let extractor = run(&[(1, Press, 0), (2, Press, 60), (1, Release, 90), (2, Release, 140)]);

        assert_eq!(extractor.flight_times_before()[&2], vec![60.0]);
        assert_eq!(extractor.dwell_times()[&1], vec![90.0]);
        assert_eq!(extractor.dwell_times()[&2], vec![80.0]);
    }

    #[test]
    fn test_extract_builds_one_leaf_per_key() {
        let extractor = run(&[(66, Press, 0), (66, Release, 50), (65, Press, 100), (65, Release, 180)]);
        let dwell = extractor.extract(TimingCategory::Dwell);

        assert_eq!(dwell.name(), "dwell_times");
        let names: Vec<&str> = dwell.child_names().collect();
        assert_eq!(names, vec!["65", "66"]);
        assert_eq!(dwell.child("65").and_then(|l| l.value()), Some(&vec![80.0]));
    }

    #[test]
    fn test_extract_features_covers_configured_categories() {
        let extractor = run(&[(65, Press, 0), (65, Release, 80)]);
        let profile = extractor.extract_features();
        assert_eq!(profile.name(), PROFILE_ROOT);
        let names: Vec<&str> = profile.child_names().collect();
        assert_eq!(names, vec!["dwell_times", "flight_times_before", "flight_times_after"]);

        let dwell_only = extractor.with_categories(&[TimingCategory::Dwell]).extract_features();
        let names: Vec<&str> = dwell_only.child_names().collect();
        assert_eq!(names, vec!["dwell_times"]);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("dwell".parse::<TimingCategory>(), Ok(TimingCategory::Dwell));
        assert_eq!("flight-before".parse::<TimingCategory>(), Ok(TimingCategory::FlightBefore));
        assert_eq!("flight_times_after".parse::<TimingCategory>(), Ok(TimingCategory::FlightAfter));
        assert!("latency".parse::<TimingCategory>().is_err());
    }

    #[test]
    fn test_stats_summary() {
        let extractor = run(&[(1, Press, 0), (1, Release, 40)]);
        let summary = extractor.stats().summary();
        assert!(summary.contains("Events processed: 2"));
        assert!(summary.contains("Dwell samples kept: 1"));
    }
}
