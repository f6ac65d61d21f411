//! Descriptive statistics over counter time series.

use serde::Serialize;

use crate::{events::Rank, series::TimeSeries};

/// Counter values that can be summarized.
pub trait CounterValue: Copy {
    fn as_f64(self) -> f64;
}

impl CounterValue for i64 {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl CounterValue for f64 {
    fn as_f64(self) -> f64 {
        self
    }
}

/// Count, mean, sample standard deviation, min, quartiles and max.
///
/// The standard deviation is `NaN` for a single observation. Quartiles are
/// linearly interpolated between the closest ranks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    #[serde(rename = "25%")]
    pub p25: f64,
    #[serde(rename = "50%")]
    pub p50: f64,
    #[serde(rename = "75%")]
    pub p75: f64,
    pub max: f64,
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;

    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

impl Describe {
    /// Returns `None` when there is nothing to describe.
    pub fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        values.sort_by(f64::total_cmp);

        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        Some(Self {
            count: n,
            mean,
            std,
            min: values[0],
            p25: quantile(&values, 0.25),
            p50: quantile(&values, 0.5),
            p75: quantile(&values, 0.75),
            max: values[n - 1],
        })
    }
}

/// Statistics of one group of one rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow<K> {
    pub rank: Rank,
    pub key: K,
    #[serde(flatten)]
    pub stats: Describe,
}

/// Summary rows, ordered by rank then group key.
pub type SummaryTable<K> = Vec<SummaryRow<K>>;

/// Describes every group of `series`, considering only the values accepted
/// by `keep`. Groups left without any value produce no row.
pub fn describe_groups<K, V, F>(rank: Rank, series: &TimeSeries<K, V>, keep: F) -> SummaryTable<K>
where
    K: PartialEq + Clone,
    V: CounterValue,
    F: Fn(V) -> bool,
{
    series
        .groups()
        .filter_map(|(key, rows)| {
            let values = rows
                .iter()
                .map(|p| p.value)
                .filter(|v| keep(*v))
                .map(|v| v.as_f64())
                .collect();

            Describe::from_values(values).map(|stats| SummaryRow {
                rank,
                key: key.clone(),
                stats,
            })
        })
        .collect()
}
