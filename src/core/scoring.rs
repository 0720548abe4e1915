//! Profile comparison built on the tree algebra and Gaussian models.
//!
//! Two profiles are first intersected so only keys typed by both are
//! compared. Each shared leaf is summarized by a [`GaussianModel`] on both
//! sides and scored; keys without enough samples are left out rather than
//! failing the whole comparison.

use crate::core::gaussian::{GaussianModel, MIN_SAMPLES};
use crate::core::tree::{Feature, FeatureTree, TreeError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Default minimum number of samples per key before it is scored.
pub const DEFAULT_MIN_SAMPLES: usize = MIN_SAMPLES;

/// Errors from profile scoring.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("no comparable features: the profiles share no keys with enough samples")]
    NoComparableFeatures,
}

/// Mean similarity over a group of keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: f64,
    pub compared: usize,
}

/// Result of comparing two profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Mean similarity over every compared key, in `[0, 1]`
    pub score: f64,
    /// Number of keys that contributed
    pub compared: usize,
    /// Per top-level category (e.g. `dwell_times`)
    pub categories: BTreeMap<String, CategoryScore>,
    /// Per-key similarity, shaped like the reference profile
    pub scores: FeatureTree<f64>,
}

/// Fit a model per leaf, dropping leaves that cannot be modelled.
pub fn fit_models(profile: &Feature, min_samples: usize) -> Result<FeatureTree<GaussianModel>, TreeError> {
    Feature::map(&[profile], |name, samples| fit(name, samples[0], min_samples))
}

fn fit(name: &str, samples: &[f64], min_samples: usize) -> Option<GaussianModel> {
    if samples.len() < min_samples {
        debug!(feature = name, samples = samples.len(), min_samples, "too few samples, skipping");
        return None;
    }
    match GaussianModel::estimate_parameters(samples) {
        Ok(model) => Some(model),
        Err(e) => {
            debug!(feature = name, error = %e, "comparison unavailable");
            None
        }
    }
}

/// Compare two profiles over the keys they share.
pub fn compare_profiles(
    reference: &Feature,
    candidate: &Feature,
    min_samples: usize,
) -> Result<Comparison, ScoreError> {
    let common = Feature::intersect(&[reference, candidate])?;
    let scores = Feature::map(&[&common[0], &common[1]], |name, leaves| {
        let a = fit(name, leaves[0], min_samples)?;
        let b = fit(name, leaves[1], min_samples)?;
        Some(a.similarity(&b))
    })?;

    let (score, compared) = mean_score(&scores)?.ok_or(ScoreError::NoComparableFeatures)?;

    let mut categories = BTreeMap::new();
    for category in scores.children().iter().filter(|c| !c.is_leaf()) {
        if let Some((score, compared)) = mean_score(category)? {
            categories.insert(category.name().to_string(), CategoryScore { score, compared });
        }
    }

    Ok(Comparison {
        score,
        compared,
        categories,
        scores,
    })
}

/// Mean leaf value and leaf count, `None` when the tree has no leaves.
fn mean_score(scores: &FeatureTree<f64>) -> Result<Option<(f64, usize)>, TreeError> {
    let Some(pruned) = scores.prune_empty() else {
        return Ok(None);
    };
    let total = pruned.reduce(|a, b| a + b)?;
    let count = pruned.leaf_count();
    Ok(Some((total / count as f64, count)))
}

/// Score one live observation against the model at `path`.
///
/// Returns `None` when the reference has no model there.
pub fn score_observation(models: &FeatureTree<GaussianModel>, path: &[&str], x: f64) -> Option<f64> {
    models.find(path)?.value().map(|model| model.similarity_to_sample(x))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(dwell: &[(&str, &[f64])], flight: &[(&str, &[f64])]) -> Feature {
        let leaves = |pairs: &[(&str, &[f64])]| -> Vec<Feature> {
            pairs.iter().map(|(k, v)| Feature::leaf(*k, v.to_vec())).collect()
        };
        Feature::composite(
            "keystroke_features",
            vec![
                Feature::composite("dwell_times", leaves(dwell)),
                Feature::composite("flight_times_before", leaves(flight)),
            ],
        )
    }

    #[test]
    fn test_identical_profiles_score_one() {
        let p = profile(&[("65", &[80.0, 90.0, 100.0]), ("66", &[50.0, 55.0])], &[("66", &[40.0, 60.0])]);
        let cmp = compare_profiles(&p, &p, DEFAULT_MIN_SAMPLES).unwrap();
        assert_eq!(cmp.compared, 3);
        assert!((cmp.score - 1.0).abs() < 1e-9);
        assert_eq!(cmp.categories["dwell_times"].compared, 2);
    }

    #[test]
    fn test_only_shared_keys_are_compared() {
        let a = profile(&[("65", &[80.0, 90.0]), ("67", &[10.0, 20.0])], &[]);
        let b = profile(&[("65", &[80.0, 90.0]), ("68", &[500.0, 600.0])], &[]);
        let cmp = compare_profiles(&a, &b, DEFAULT_MIN_SAMPLES).unwrap();

        assert_eq!(cmp.compared, 1);
        assert!(cmp.scores.find(&["dwell_times", "65"]).is_some());
        assert!(cmp.scores.find(&["dwell_times", "67"]).is_none());
        assert!(!cmp.categories.contains_key("flight_times_before"));
    }

    #[test]
    fn test_insufficient_keys_are_excluded() {
        let a = profile(&[("65", &[80.0, 90.0]), ("66", &[50.0])], &[]);
        let b = profile(&[("65", &[80.0, 90.0]), ("66", &[150.0, 160.0])], &[]);
        let cmp = compare_profiles(&a, &b, DEFAULT_MIN_SAMPLES).unwrap();

        assert_eq!(cmp.compared, 1);
        assert!((cmp.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_different_typists_score_lower() {
        let a = profile(&[("65", &[80.0, 85.0, 90.0])], &[]);
        let b = profile(&[("65", &[80.0, 86.0, 91.0])], &[]);
        let c = profile(&[("65", &[200.0, 210.0, 220.0])], &[]);

        let close = compare_profiles(&a, &b, 2).unwrap().score;
        let far = compare_profiles(&a, &c, 2).unwrap().score;
        assert!(far < close);
    }

    #[test]
    fn test_nothing_comparable() {
        let a = profile(&[("65", &[80.0])], &[]);
        let b = profile(&[("66", &[80.0, 90.0])], &[]);
        assert_eq!(
            compare_profiles(&a, &b, DEFAULT_MIN_SAMPLES),
            Err(ScoreError::NoComparableFeatures)
        );
    }

    #[test]
    fn test_min_samples_raises_the_bar() {
        let p = profile(&[("65", &[80.0, 90.0]), ("66", &[50.0, 55.0, 60.0])], &[]);
        let models = fit_models(&p, 3).unwrap();
        assert_eq!(models.leaf_count(), 1);
        assert!(models.find(&["dwell_times", "66"]).is_some());
    }

    #[test]
    fn test_score_observation() {
        let p = profile(&[("65", &[90.0, 110.0])], &[]);
        let models = fit_models(&p, DEFAULT_MIN_SAMPLES).unwrap();

        let at_mean = score_observation(&models, &["dwell_times", "65"], 100.0).unwrap();
        assert!((at_mean - 1.0).abs() < 1e-9);

        let one_sigma = score_observation(&models, &["dwell_times", "65"], 110.0).unwrap();
        assert!((one_sigma - 0.317_310_507_862_914).abs() < 1e-6);

        assert!(score_observation(&models, &["dwell_times", "99"], 100.0).is_none());
    }
}
