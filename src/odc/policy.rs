use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// What the aggregation does with a single finding.
///
/// Every finding lands in exactly one of these buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Rule is on the exclusion list (known noise, style-only, environment).
    Excluded,
    /// Rule has no ODC category.
    Uncategorized,
    /// Counted as a defect of the given ODC category.
    Counted(String),
}

/// Exclusion list applied before category lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionPolicy {
    #[serde(default)]
    pub excluded: BTreeSet<String>,
}

impl ExclusionPolicy {
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: rules.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_excluded(&self, rule: &str) -> bool {
        self.excluded.contains(rule)
    }

    /// Classify a finding given its rule and looked-up category.
    pub fn classify(&self, rule: &str, category: Option<&str>) -> Disposition {
        if self.is_excluded(rule) {
            return Disposition::Excluded;
        }
        match category {
            Some(cat) => Disposition::Counted(cat.to_string()),
            None => Disposition::Uncategorized,
        }
    }
}
