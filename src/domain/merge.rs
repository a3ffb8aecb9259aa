//! Shared merge algebra.
//!
//! Every implementation must be commutative, associative and idempotent so
//! that any interleaving of pulls, pushes and retries converges.

use std::collections::{BTreeMap, BTreeSet};

pub trait Merge {
    fn merge(&self, other: &Self) -> Self;
}

/// Keys present on one side are taken as-is, shared keys merge value-wise.
impl<V: Merge + Clone> Merge for BTreeMap<String, V> {
    fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for (key, theirs) in other {
            let value = match self.get(key) {
                Some(ours) => ours.merge(theirs),
                None => theirs.clone(),
            };
            merged.insert(key.clone(), value);
        }
        merged
    }
}

impl<T: Ord + Clone> Merge for BTreeSet<T> {
    fn merge(&self, other: &Self) -> Self {
        self.union(other).cloned().collect()
    }
}

/// Absent on one side means "no data yet" there.
pub fn merge_optional<T: Merge + Clone>(a: Option<&T>, b: Option<&T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.merge(b)),
        (Some(v), None) | (None, Some(v)) => Some(v.clone()),
        (None, None) => None,
    }
}

/// Earliest non-null value.
pub fn earliest<T: Ord + Clone>(a: &Option<T>, b: &Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b).clone()),
        (Some(v), None) | (None, Some(v)) => Some(v.clone()),
        (None, None) => None,
    }
}

/// Latest non-null value.
pub fn latest<T: Ord + Clone>(a: &Option<T>, b: &Option<T>) -> Option<T> {
    a.clone().max(b.clone())
}

pub fn max_f64(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if a.total_cmp(&b).is_ge() { a } else { b }),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

/// Document versions are dotted numeric strings; the newer one wins.
pub fn max_version(a: &str, b: &str) -> String {
    let parse = |v: &str| -> Vec<u64> { v.split('.').map(|p| p.parse().unwrap_or(0)).collect() };
    match parse(a).cmp(&parse(b)).then_with(|| a.cmp(b)) {
        std::cmp::Ordering::Less => b.to_string(),
        _ => a.to_string(),
    }
}
