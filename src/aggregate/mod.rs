//! Finding aggregation shared by the PMD and pylint processors.
//!
//! Each processor turns its tool's native output into a sequence of
//! `(sample, rule, disposition)` triples and folds them into a
//! [`DefectTally`]. The fold only counts, so the order in which report
//! files or JSONL lines are visited does not change the result.

pub mod pmd;
pub mod pylint;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::odc::Disposition;

/// Identity of one code unit: a dataset index or a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum SampleId {
    Index(u64),
    Name(String),
}

impl SampleId {
    /// Interpret a JSON value as a sample id. Non-negative integers and
    /// numeric strings become indices; other strings stay names.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_u64().map(Self::Index),
            serde_json::Value::String(s) => Some(
                s.trim()
                    .parse::<u64>()
                    .map(Self::Index)
                    .unwrap_or_else(|_| Self::Name(s.clone())),
            ),
            _ => None,
        }
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{}", i),
            Self::Name(n) => write!(f, "{}", n),
        }
    }
}

/// Occurrence counter with a deterministic ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Counter<K: Ord> {
    counts: BTreeMap<K, usize>,
}

impl<K: Ord> Default for Counter<K> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> Counter<K> {
    pub fn add(&mut self, key: K) {
        self.add_n(key, 1);
    }

    pub fn add_n(&mut self, key: K, n: usize) {
        *self.counts.entry(key).or_insert(0) += n;
    }

    pub fn get(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Entries sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&K, usize)> {
        self.counts.iter().map(|(k, &v)| (k, v))
    }

    /// Entries by descending count; ties are broken by ascending key.
    /// `limit = None` returns every entry.
    pub fn most_common(&self, limit: Option<usize>) -> Vec<(K, usize)> {
        let mut ranked: Vec<(K, usize)> =
            self.counts.iter().map(|(k, &v)| (k.clone(), v)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(n) = limit {
            ranked.truncate(n);
        }
        ranked
    }
}

impl<K: Ord + Clone> FromIterator<K> for Counter<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut counter = Self::default();
        for key in iter {
            counter.add(key);
        }
        counter
    }
}

/// Accumulator for one defect-counting pass.
#[derive(Debug, Clone, Serialize)]
pub struct DefectTally<S: Ord> {
    pub total_findings: usize,
    pub excluded: usize,
    pub uncategorized: usize,
    pub total_defects: usize,
    pub by_category: Counter<String>,
    pub by_rule: Counter<String>,
    pub rules_by_category: BTreeMap<String, Counter<String>>,
    #[serde(skip)]
    categories_by_sample: BTreeMap<S, BTreeSet<String>>,
}

impl<S: Ord> Default for DefectTally<S> {
    fn default() -> Self {
        Self {
            total_findings: 0,
            excluded: 0,
            uncategorized: 0,
            total_defects: 0,
            by_category: Counter::default(),
            by_rule: Counter::default(),
            rules_by_category: BTreeMap::new(),
            categories_by_sample: BTreeMap::new(),
        }
    }
}

impl<S: Ord + Clone> DefectTally<S> {
    /// Fold one finding into the tally.
    pub fn record(&mut self, sample: &S, rule: &str, disposition: Disposition) {
        self.total_findings += 1;
        match disposition {
            Disposition::Excluded => self.excluded += 1,
            Disposition::Uncategorized => self.uncategorized += 1,
            Disposition::Counted(category) => {
                self.total_defects += 1;
                self.by_category.add(category.clone());
                self.by_rule.add(rule.to_string());
                self.rules_by_category
                    .entry(category.clone())
                    .or_default()
                    .add(rule.to_string());
                self.categories_by_sample
                    .entry(sample.clone())
                    .or_default()
                    .insert(category);
            }
        }
    }

    /// Samples with at least one counted defect.
    pub fn defective_samples(&self) -> impl Iterator<Item = &S> {
        self.categories_by_sample.keys()
    }

    pub fn defective_sample_count(&self) -> usize {
        self.categories_by_sample.len()
    }

    pub fn is_defective(&self, sample: &S) -> bool {
        self.categories_by_sample.contains_key(sample)
    }

    pub fn average_defects_per_sample(&self) -> f64 {
        let samples = self.defective_sample_count();
        if samples == 0 {
            0.0
        } else {
            self.total_defects as f64 / samples as f64
        }
    }

    /// Number of defective samples keyed by how many distinct ODC
    /// categories they exhibit.
    pub fn category_spread(&self) -> BTreeMap<usize, usize> {
        let mut spread = BTreeMap::new();
        for categories in self.categories_by_sample.values() {
            *spread.entry(categories.len()).or_insert(0) += 1;
        }
        spread
    }
}

/// `part / whole` as a percentage; zero when `whole` is zero.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_common_breaks_ties_by_key() {
        let counter: Counter<String> = ["b", "a", "c", "c"].iter().map(|s| s.to_string()).collect();
        let ranked = counter.most_common(None);
        assert_eq!(
            ranked,
            vec![("c".to_string(), 2), ("a".to_string(), 1), ("b".to_string(), 1)]
        );
        assert_eq!(counter.most_common(Some(1)).len(), 1);
        assert_eq!(counter.total(), 4);
    }

    #[test]
    fn dispositions_partition_findings() {
        let mut tally: DefectTally<u32> = DefectTally::default();
        tally.record(&1, "GodClass", Disposition::Excluded);
        tally.record(&1, "ShortVariable", Disposition::Uncategorized);
        tally.record(&1, "EmptyCatchBlock", Disposition::Counted("Checking".into()));
        tally.record(&2, "EmptyCatchBlock", Disposition::Counted("Checking".into()));
        tally.record(&2, "SwitchDensity", Disposition::Counted("Algorithm".into()));

        assert_eq!(tally.total_findings, 5);
        assert_eq!(
            tally.excluded + tally.uncategorized + tally.total_defects,
            tally.total_findings
        );
        assert_eq!(tally.defective_sample_count(), 2);
        assert_eq!(tally.by_rule.get(&"EmptyCatchBlock".to_string()), 2);
        assert_eq!(tally.average_defects_per_sample(), 1.5);
    }

    #[test]
    fn category_spread_counts_distinct_categories() {
        let mut tally: DefectTally<u32> = DefectTally::default();
        tally.record(&1, "r1", Disposition::Counted("Checking".into()));
        tally.record(&1, "r2", Disposition::Counted("Checking".into()));
        tally.record(&2, "r1", Disposition::Counted("Checking".into()));
        tally.record(&2, "r3", Disposition::Counted("Algorithm".into()));

        let spread = tally.category_spread();
        assert_eq!(spread.get(&1), Some(&1));
        assert_eq!(spread.get(&2), Some(&1));
    }

    #[test]
    fn samples_with_only_noise_are_not_defective() {
        let mut tally: DefectTally<u32> = DefectTally::default();
        tally.record(&7, "GodClass", Disposition::Excluded);
        assert!(!tally.is_defective(&7));
        assert_eq!(tally.average_defects_per_sample(), 0.0);
    }

    #[test]
    fn sample_id_from_json() {
        assert_eq!(
            SampleId::from_json(&serde_json::json!(42)),
            Some(SampleId::Index(42))
        );
        assert_eq!(
            SampleId::from_json(&serde_json::json!("17")),
            Some(SampleId::Index(17))
        );
        assert_eq!(
            SampleId::from_json(&serde_json::json!("Foo.java")),
            Some(SampleId::Name("Foo.java".into()))
        );
        assert_eq!(SampleId::from_json(&serde_json::Value::Null), None);
    }

    #[test]
    fn percent_of_empty_whole_is_zero() {
        assert_eq!(percent(3, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }
}
