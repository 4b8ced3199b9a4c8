use serde::Serialize;

use super::FunctionMetrics;

/// Descriptive statistics of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricStats {
    Empty,
    /// A lone value has no sample deviation.
    Single {
        value: f64,
    },
    Summary {
        mean: f64,
        min: f64,
        max: f64,
        stdev: f64,
    },
}

/// Mean, min, max and sample standard deviation of `values`.
pub fn describe(values: &[f64]) -> MetricStats {
    match values {
        [] => MetricStats::Empty,
        [value] => MetricStats::Single { value: *value },
        _ => {
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            MetricStats::Summary {
                mean,
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                stdev: variance.sqrt(),
            }
        }
    }
}

/// Statistics over the functions extracted from one field (or all fields).
#[derive(Debug, Clone, Serialize)]
pub struct FieldSummary {
    pub field: String,
    pub functions: usize,
    pub nloc: MetricStats,
    pub ccn: MetricStats,
    pub token_count: MetricStats,
    pub function_name_length: MetricStats,
    pub unique_tokens: usize,
}

impl FieldSummary {
    pub fn from_functions(field: &str, functions: &[FunctionMetrics], unique_tokens: usize) -> Self {
        let column = |metric: fn(&FunctionMetrics) -> usize| {
            let values: Vec<f64> = functions.iter().map(|f| metric(f) as f64).collect();
            describe(&values)
        };
        Self {
            field: field.to_string(),
            functions: functions.len(),
            nloc: column(|f| f.nloc),
            ccn: column(|f| f.ccn),
            token_count: column(|f| f.token_count),
            function_name_length: column(|f| f.function_name_length),
            unique_tokens,
        }
    }

    /// Metric name and statistics, in report order.
    pub fn metrics(&self) -> [(&'static str, &MetricStats); 4] {
        [
            ("nloc", &self.nloc),
            ("ccn", &self.ccn),
            ("token_count", &self.token_count),
            ("function_name_length", &self.function_name_length),
        ]
    }
}

/// Result of profiling a dataset.
#[derive(Debug, Clone, Serialize)]
pub struct ComplexityReport {
    pub language: crate::language::Language,
    pub samples_read: usize,
    pub malformed_lines: usize,
    pub analysis_failures: usize,
    pub fields: Vec<FieldSummary>,
    pub aggregate: FieldSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_degrades_gracefully() {
        assert_eq!(describe(&[]), MetricStats::Empty);
        assert_eq!(describe(&[3.0]), MetricStats::Single { value: 3.0 });
    }

    #[test]
    fn describe_uses_sample_deviation() {
        match describe(&[1.0, 2.0, 3.0, 4.0]) {
            MetricStats::Summary { mean, min, max, stdev } => {
                assert_eq!(mean, 2.5);
                assert_eq!(min, 1.0);
                assert_eq!(max, 4.0);
                assert!((stdev - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn field_summary_columns() {
        let functions = vec![
            FunctionMetrics {
                name: "a".into(),
                nloc: 3,
                ccn: 1,
                token_count: 10,
                function_name_length: 1,
            },
            FunctionMetrics {
                name: "bb".into(),
                nloc: 5,
                ccn: 3,
                token_count: 20,
                function_name_length: 2,
            },
        ];
        let summary = FieldSummary::from_functions("human_code", &functions, 7);
        assert_eq!(summary.functions, 2);
        assert_eq!(summary.unique_tokens, 7);
        match summary.ccn {
            MetricStats::Summary { mean, .. } => assert_eq!(mean, 2.0),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(FieldSummary::from_functions("x", &[], 0).nloc, MetricStats::Empty);
    }
}
