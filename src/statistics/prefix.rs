//! Histograms of string prefixes.

use std::collections::HashMap;

/// The number of leading characters of a string used as a histogram bucket.
pub const PREFIX_LEN: usize = 3;

/// Counts how many values of a string column start with each prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixHistogram {
    counts: HashMap<String, u64>,
    total: u64,
}

impl PrefixHistogram {
    pub fn new() -> Self {
        PrefixHistogram::default()
    }

    /// Adds the given value to this histogram.
    pub fn add(&mut self, value: &str) {
        let prefix: String = value.chars().take(PREFIX_LEN).collect();
        *self.counts.entry(prefix).or_default() += 1;
        self.total += 1;
    }

    /// Adds `count` values with the given prefix.
    pub fn add_prefix(&mut self, prefix: &str, count: u64) {
        let prefix: String = prefix.chars().take(PREFIX_LEN).collect();
        *self.counts.entry(prefix).or_default() += count;
        self.total += count;
    }

    /// The number of values added to this histogram.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Returns the number of values that start with the given prefix.
    pub fn count(&self, prefix: &str) -> u64 {
        self.counts.get(prefix).copied().unwrap_or_default()
    }

    /// Weighted Jaccard similarity of two histograms: the sum of per-prefix minimums divided by
    /// the size of the union of both multisets. Returns `None` if both histograms are empty.
    pub fn jaccard(&self, other: &PrefixHistogram) -> Option<f64> {
        let intersection: u64 = self
            .counts
            .iter()
            .map(|(prefix, count)| (*count).min(other.count(prefix)))
            .sum();
        let union = self.total + other.total - intersection;
        if union > 0 {
            Some(intersection as f64 / union as f64)
        } else {
            None
        }
    }
}
