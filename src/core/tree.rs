//! Named feature trees and the algebra over them.
//!
//! A [`FeatureTree`] is either a named leaf carrying a payload (timing
//! samples for an extracted profile) or a named composite of uniquely named
//! children. Profiles from two typists rarely share every key, so the
//! algebra works across several trees at once:
//!
//! - [`FeatureTree::intersect`] trims every tree to the child names common to all
//! - [`FeatureTree::map`] walks congruent trees in lockstep and transforms leaves
//! - [`FeatureTree::reduce`] folds a tree down to a single leaf value
//!
//! None of these mutate their inputs; each returns new trees.

use crate::store::Versioned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised by tree construction and the tree algebra.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("no trees supplied")]
    NoTrees,

    #[error("'{name}' is a leaf, expected a composite")]
    NotComposite { name: String },

    #[error("child '{path}' is a leaf in some trees and a composite in others")]
    KindMismatch { path: String },

    #[error("trees are not congruent at '{path}': expected children {expected:?}, found {found:?}")]
    Incongruent {
        path: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("duplicate child '{child}' in '{parent}'")]
    DuplicateChild { parent: String, child: String },

    #[error("cannot reduce '{name}': composite has no children")]
    EmptyReduce { name: String },
}

/// A named tree whose leaves carry values of type `L`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureTree<L> {
    Leaf {
        name: String,
        value: L,
    },
    Composite {
        name: String,
        children: Vec<FeatureTree<L>>,
    },
}

/// A typing profile: leaves are timing samples in observation order.
pub type Feature = FeatureTree<Vec<f64>>;

impl<L> FeatureTree<L> {
    pub fn leaf(name: impl Into<String>, value: L) -> Self {
        Self::Leaf {
            name: name.into(),
            value,
        }
    }

    /// Build a composite. A later child with an already used name replaces
    /// the earlier one at its original position.
    pub fn composite(name: impl Into<String>, children: impl IntoIterator<Item = Self>) -> Self {
        let mut unique: Vec<Self> = Vec::new();
        for child in children {
            match unique.iter_mut().find(|c| c.name() == child.name()) {
                Some(slot) => *slot = child,
                None => unique.push(child),
            }
        }
        Self::Composite {
            name: name.into(),
            children: unique,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Leaf { name, .. } | Self::Composite { name, .. } => name,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Leaf payload, `None` for composites.
    pub fn value(&self) -> Option<&L> {
        match self {
            Self::Leaf { value, .. } => Some(value),
            Self::Composite { .. } => None,
        }
    }

    /// Immediate children in insertion order. Empty for leaves.
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Leaf { .. } => &[],
            Self::Composite { children, .. } => children,
        }
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children().iter().map(|c| c.name())
    }

    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children().iter().find(|c| c.name() == name)
    }

    /// Follow a path of child names from this node.
    pub fn find(&self, path: &[&str]) -> Option<&Self> {
        path.iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// A new tree with `child` added, replacing any child of the same name
    /// in place.
    pub fn with_child(self, child: Self) -> Result<Self, TreeError> {
        match self {
            Self::Leaf { name, .. } => Err(TreeError::NotComposite { name }),
            Self::Composite { name, mut children } => {
                match children.iter_mut().find(|c| c.name() == child.name()) {
                    Some(slot) => *slot = child,
                    None => children.push(child),
                }
                Ok(Self::Composite { name, children })
            }
        }
    }

    /// Number of leaves below this node (1 for a leaf).
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf { .. } => 1,
            Self::Composite { children, .. } => children.iter().map(|c| c.leaf_count()).sum(),
        }
    }

    /// Depth-first `(name, value)` pairs for every leaf.
    pub fn leaves(&self) -> Vec<(&str, &L)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<(&'a str, &'a L)>) {
        match self {
            Self::Leaf { name, value } => out.push((name.as_str(), value)),
            Self::Composite { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Check that every composite has uniquely named children.
    ///
    /// Trees built through [`FeatureTree::composite`] always pass; this
    /// guards trees that arrive through deserialization.
    pub fn validate(&self) -> Result<(), TreeError> {
        if let Self::Composite { name, children } = self {
            let mut seen = HashSet::new();
            for child in children {
                if !seen.insert(child.name()) {
                    return Err(TreeError::DuplicateChild {
                        parent: name.clone(),
                        child: child.name().to_string(),
                    });
                }
                child.validate()?;
            }
        }
        Ok(())
    }

    /// Transform congruent trees leaf by leaf.
    ///
    /// All trees must have the same child names at every level. For each
    /// group of corresponding leaves `leaf_fn(name, values)` is called with
    /// one value per tree; returning `None` drops that child from the result.
    /// Corresponding composites are recursed into. The result is named after
    /// the first tree and follows its child order.
    pub fn map<M, F>(trees: &[&Self], mut leaf_fn: F) -> Result<FeatureTree<M>, TreeError>
    where
        F: FnMut(&str, &[&L]) -> Option<M>,
    {
        let first = trees.first().ok_or(TreeError::NoTrees)?;
        if let Some(leaf) = trees.iter().find(|t| t.is_leaf()) {
            return Err(TreeError::NotComposite {
                name: leaf.name().to_string(),
            });
        }
        Self::map_level(trees, &mut leaf_fn, first.name())
    }

    fn map_level<M, F>(trees: &[&Self], leaf_fn: &mut F, path: &str) -> Result<FeatureTree<M>, TreeError>
    where
        F: FnMut(&str, &[&L]) -> Option<M>,
    {
        let first = trees[0];
        for tree in &trees[1..] {
            let congruent = tree.children().len() == first.children().len()
                && first.child_names().all(|n| tree.child(n).is_some());
            if !congruent {
                return Err(TreeError::Incongruent {
                    path: path.to_string(),
                    expected: first.child_names().map(String::from).collect(),
                    found: tree.child_names().map(String::from).collect(),
                });
            }
        }

        let mut children = Vec::with_capacity(first.children().len());
        for name in first.child_names() {
            let group: Vec<&Self> = trees.iter().filter_map(|t| t.child(name)).collect();
            let child_path = format!("{path}/{name}");

            let values: Option<Vec<&L>> = group.iter().map(|c| c.value()).collect();
            match values {
                Some(values) => {
                    if let Some(mapped) = leaf_fn(name, &values) {
                        children.push(FeatureTree::leaf(name, mapped));
                    }
                }
                None if group.iter().all(|c| !c.is_leaf()) => {
                    children.push(Self::map_level(&group, leaf_fn, &child_path)?);
                }
                None => return Err(TreeError::KindMismatch { path: child_path }),
            }
        }

        Ok(FeatureTree::Composite {
            name: first.name().to_string(),
            children,
        })
    }
}

impl<L: Clone> FeatureTree<L> {
    /// Restrict trees to the children they all share.
    ///
    /// Returns one tree per input, each a copy of its input holding only the
    /// child names present in every input at that level. Shared composites
    /// are intersected recursively; shared leaves are copied verbatim. Every
    /// output follows the first tree's child order so the results can be fed
    /// straight into [`FeatureTree::map`].
    pub fn intersect(trees: &[&Self]) -> Result<Vec<Self>, TreeError> {
        let first = trees.first().ok_or(TreeError::NoTrees)?;
        if let Some(leaf) = trees.iter().find(|t| t.is_leaf()) {
            return Err(TreeError::NotComposite {
                name: leaf.name().to_string(),
            });
        }
        Self::intersect_level(trees, first.name())
    }

    fn intersect_level(trees: &[&Self], path: &str) -> Result<Vec<Self>, TreeError> {
        let name_sets: Vec<HashSet<&str>> = trees.iter().map(|t| t.child_names().collect()).collect();
        let common: Vec<&str> = trees[0]
            .child_names()
            .filter(|n| name_sets.iter().all(|set| set.contains(n)))
            .collect();

        let mut columns: Vec<Vec<Self>> = trees.iter().map(|_| Vec::with_capacity(common.len())).collect();
        for name in common {
            let group: Vec<&Self> = trees.iter().filter_map(|t| t.child(name)).collect();
            let leaves = group.iter().filter(|c| c.is_leaf()).count();
            let child_path = format!("{path}/{name}");

            if leaves == group.len() {
                for (column, child) in columns.iter_mut().zip(&group) {
                    column.push((*child).clone());
                }
            } else if leaves == 0 {
                let trimmed = Self::intersect_level(&group, &child_path)?;
                for (column, child) in columns.iter_mut().zip(trimmed) {
                    column.push(child);
                }
            } else {
                return Err(TreeError::KindMismatch { path: child_path });
            }
        }

        Ok(trees
            .iter()
            .zip(columns)
            .map(|(tree, children)| Self::Composite {
                name: tree.name().to_string(),
                children,
            })
            .collect())
    }

    /// Copy without composites that hold no leaves, `None` if nothing is left.
    pub fn prune_empty(&self) -> Option<Self> {
        match self {
            Self::Leaf { .. } => Some(self.clone()),
            Self::Composite { name, children } => {
                let kept: Vec<Self> = children.iter().filter_map(|c| c.prune_empty()).collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(Self::Composite {
                        name: name.clone(),
                        children: kept,
                    })
                }
            }
        }
    }

    /// Fold the tree into a single value.
    ///
    /// Children are combined left to right in insertion order; composite
    /// children are reduced first. `combine` should be associative, the
    /// grouping of calls follows the tree shape. A composite with no
    /// children anywhere in the tree is an error.
    pub fn reduce<F>(&self, mut combine: F) -> Result<L, TreeError>
    where
        F: FnMut(L, L) -> L,
    {
        self.reduce_with(&mut combine)
    }

    fn reduce_with<F>(&self, combine: &mut F) -> Result<L, TreeError>
    where
        F: FnMut(L, L) -> L,
    {
        match self {
            Self::Leaf { value, .. } => Ok(value.clone()),
            Self::Composite { name, children } => {
                let mut acc: Option<L> = None;
                for child in children {
                    let value = child.reduce_with(combine)?;
                    acc = Some(match acc {
                        Some(prev) => combine(prev, value),
                        None => value,
                    });
                }
                acc.ok_or_else(|| TreeError::EmptyReduce { name: name.clone() })
            }
        }
    }
}

impl Versioned for Feature {
    const KIND: &'static str = "keystroke_profile";
    const VERSION: u32 = 1;
    const FILE_EXTENSION: &'static str = "profile";

    fn check_integrity(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())
    }
}
