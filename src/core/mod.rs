//! Core functionality for keystroke profiling.
//!
//! This module contains:
//! - Feature extraction from keystroke events
//! - The feature tree and its algebra (intersect, map, reduce)
//! - Gaussian models and similarity scoring

pub mod features;
pub mod gaussian;
pub mod scoring;
pub mod tree;

// Re-export commonly used types
pub use features::{
    ExtractionStats, FeatureExtractor, TimingCategory, DEFAULT_TIMING_THRESHOLD_MS, PROFILE_ROOT,
};
pub use gaussian::{GaussianModel, ModelError};
pub use scoring::{
    compare_profiles, fit_models, score_observation, CategoryScore, Comparison, ScoreError,
    DEFAULT_MIN_SAMPLES,
};
pub use tree::{Feature, FeatureTree, TreeError};
