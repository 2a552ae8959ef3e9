//! Template occurrence counts for one processing run.

use crate::normalize::Template;
use serde::Serialize;
use std::collections::HashMap;

/// Mapping from template to a positive occurrence count.
///
/// Counts are additive, so mappings built from disjoint slices of a source
/// can be summed in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FrequencyMapping {
    counts: HashMap<Template, u64>,
}

impl FrequencyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct templates.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Count for a template, if it was seen.
    pub fn get(&self, template: &str) -> Option<u64> {
        self.counts.get(template).copied()
    }

    /// Add `count` occurrences of `template`. Zero counts are ignored so
    /// every stored count stays positive.
    pub fn add(&mut self, template: Template, count: u64) {
        if count == 0 {
            return;
        }
        let slot = self.counts.entry(template).or_insert(0);
        *slot = slot.saturating_add(count);
    }

    /// Record a single occurrence.
    pub fn increment(&mut self, template: Template) {
        self.add(template, 1);
    }

    /// Fold another mapping into this one.
    pub fn absorb(&mut self, other: FrequencyMapping) {
        if self.counts.is_empty() {
            self.counts = other.counts;
            return;
        }
        for (template, count) in other.counts {
            self.add(template, count);
        }
    }

    /// Sum of all counts.
    pub fn total_occurrences(&self) -> u64 {
        self.counts
            .values()
            .fold(0u64, |acc, c| acc.saturating_add(*c))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Template, u64)> + '_ {
        self.counts.iter().map(|(t, c)| (t, *c))
    }

    /// Entries ordered by count descending, then template ascending.
    pub fn ranked(&self) -> Vec<(&Template, u64)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

impl<T: Into<Template>> FromIterator<(T, u64)> for FrequencyMapping {
    fn from_iter<I: IntoIterator<Item = (T, u64)>>(iter: I) -> Self {
        let mut mapping = FrequencyMapping::new();
        for (template, count) in iter {
            mapping.add(template.into(), count);
        }
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sums_and_skips_zero() {
        let mut m = FrequencyMapping::new();
        m.add(Template::from("a"), 2);
        m.add(Template::from("a"), 3);
        m.add(Template::from("b"), 0);
        assert_eq!(m.get("a"), Some(5));
        assert_eq!(m.get("b"), None);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn absorb_is_additive() {
        let mut left: FrequencyMapping = [("a", 1), ("b", 2)].into_iter().collect();
        let right: FrequencyMapping = [("b", 3), ("c", 4)].into_iter().collect();
        left.absorb(right);
        assert_eq!(left.get("a"), Some(1));
        assert_eq!(left.get("b"), Some(5));
        assert_eq!(left.get("c"), Some(4));
        assert_eq!(left.total_occurrences(), 10);
    }

    #[test]
    fn ranked_orders_by_count_then_template() {
        let m: FrequencyMapping = [("b", 2), ("a", 2), ("c", 9)].into_iter().collect();
        let ranked: Vec<_> = m.ranked().into_iter().map(|(t, c)| (t.as_str(), c)).collect();
        assert_eq!(ranked, vec![("c", 9), ("a", 2), ("b", 2)]);
    }
}
