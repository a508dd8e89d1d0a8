//! Stratum proportion checks for train/test splits.
//!
//! Compares the share of each stratum in a stratified test set and in a
//! purely random test set against its share in the whole dataset, which is
//! how one verifies that stratification did its job.
//!
//! # Example
//!
//! ```ignore
//! use muestra::proportions::ProportionReport;
//!
//! let report = ProportionReport::for_dataset(&housing, "income_cat", 0.2, 42)?;
//! println!("{report}");
//! assert!(report.worst_stratified_error() <= report.worst_random_error());
//! ```

// Statistical computation requires usize->f64 casts
#![allow(clippy::cast_precision_loss)]

use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::{
    dataset::ArrowDataset,
    error::{Error, Result},
    split::uniform_split,
    stratified::{dataset_keys, DegenerateStratumPolicy, StratifiedShuffleSplit, StratumKey},
};

/// Per-stratum counts over a subset of rows.
#[derive(Debug, Clone, Default)]
pub struct StratumDistribution {
    /// Count per stratum
    pub counts: BTreeMap<StratumKey, usize>,
    /// Number of rows counted
    pub total: usize,
}

impl StratumDistribution {
    /// Counts the labels found at `positions`.
    ///
    /// Positions outside `labels` are ignored.
    pub fn from_labels(labels: &[StratumKey], positions: &[usize]) -> Self {
        let mut counts: BTreeMap<StratumKey, usize> = BTreeMap::new();
        let mut total = 0;
        for key in positions.iter().filter_map(|&p| labels.get(p)) {
            *counts.entry(key.clone()).or_default() += 1;
            total += 1;
        }
        Self { counts, total }
    }

    /// Counts every label.
    pub fn of_all(labels: &[StratumKey]) -> Self {
        let positions: Vec<usize> = (0..labels.len()).collect();
        Self::from_labels(labels, &positions)
    }

    /// Number of distinct strata seen
    pub fn num_strata(&self) -> usize {
        self.counts.len()
    }

    /// Get count for a specific stratum
    pub fn get_count(&self, key: &StratumKey) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Get proportion for a specific stratum (0.0 when nothing was counted)
    pub fn get_proportion(&self, key: &StratumKey) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.get_count(key) as f64 / self.total as f64
        }
    }
}

/// One row of a [`ProportionReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StratumComparison {
    /// Stratum label
    pub stratum: StratumKey,
    /// Share of the stratum in the whole dataset
    pub overall: f64,
    /// Share in the stratified test set
    pub stratified: f64,
    /// Share in the uniform random test set
    pub random: f64,
    /// `100 * (stratified / overall - 1)`
    pub stratified_error_pct: f64,
    /// `100 * (random / overall - 1)`
    pub random_error_pct: f64,
}

/// Overall vs stratified vs random stratum shares.
#[derive(Debug, Clone, Serialize)]
pub struct ProportionReport {
    /// Test ratio both splits used
    pub ratio: f64,
    /// Seed both splits used
    pub seed: u64,
    /// Number of records
    pub total: usize,
    /// One row per stratum, in stratum order
    pub strata: Vec<StratumComparison>,
}

fn error_pct(share: f64, overall: f64) -> f64 {
    if overall > 0.0 {
        100.0 * (share / overall - 1.0)
    } else {
        0.0
    }
}

impl ProportionReport {
    /// Builds the report for positions labelled by `labels`.
    ///
    /// Strata too small for a test row are kept on the train side rather
    /// than rejected.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if `ratio` is outside `[0, 1]`.
    pub fn compare(labels: &[StratumKey], ratio: f64, seed: u64) -> Result<Self> {
        let stratified = StratifiedShuffleSplit::new(ratio)
            .seed(seed)
            .degenerate_policy(DegenerateStratumPolicy::AssignToTrain)
            .split_labels(labels)?
            .next()
            .ok_or_else(|| Error::invalid_argument("stratified split produced no partition"))?;
        let random = uniform_split(labels.len(), ratio, seed)?;

        let overall = StratumDistribution::of_all(labels);
        let in_stratified = StratumDistribution::from_labels(labels, &stratified.test);
        let in_random = StratumDistribution::from_labels(labels, &random.test);

        let strata = overall
            .counts
            .keys()
            .map(|key| {
                let overall_share = overall.get_proportion(key);
                let stratified_share = in_stratified.get_proportion(key);
                let random_share = in_random.get_proportion(key);
                StratumComparison {
                    stratum: key.clone(),
                    overall: overall_share,
                    stratified: stratified_share,
                    random: random_share,
                    stratified_error_pct: error_pct(stratified_share, overall_share),
                    random_error_pct: error_pct(random_share, overall_share),
                }
            })
            .collect();

        Ok(Self {
            ratio,
            seed,
            total: labels.len(),
            strata,
        })
    }

    /// Builds the report from the labels of `strata_field`.
    ///
    /// # Errors
    /// As [`Self::compare`], plus [`Error::MissingField`] and label errors.
    pub fn for_dataset(
        dataset: &ArrowDataset,
        strata_field: &str,
        ratio: f64,
        seed: u64,
    ) -> Result<Self> {
        crate::split::validate_ratio(ratio)?;
        let labels = dataset_keys(dataset, strata_field)?;
        Self::compare(&labels, ratio, seed)
    }

    /// Largest absolute percentage error of the stratified split.
    pub fn worst_stratified_error(&self) -> f64 {
        self.strata
            .iter()
            .map(|s| s.stratified_error_pct.abs())
            .fold(0.0, f64::max)
    }

    /// Largest absolute percentage error of the random split.
    pub fn worst_random_error(&self) -> f64 {
        self.strata
            .iter()
            .map(|s| s.random_error_pct.abs())
            .fold(0.0, f64::max)
    }

    /// Serializes the report as pretty JSON.
    ///
    /// # Errors
    /// Returns [`Error::Format`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Format(e.to_string()))
    }
}

impl fmt::Display for ProportionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<12} {:>10} {:>12} {:>10} {:>12} {:>10}",
            "stratum", "overall", "stratified", "random", "strat. %err", "rand. %err"
        )?;
        for row in &self.strata {
            writeln!(
                f,
                "{:<12} {:>10.4} {:>12.4} {:>10.4} {:>12.2} {:>10.2}",
                row.stratum.to_string(),
                row.overall,
                row.stratified,
                row.random,
                row.stratified_error_pct,
                row.random_error_pct
            )?;
        }
        write!(
            f,
            "worst |%err|: stratified {:.2}, random {:.2}",
            self.worst_stratified_error(),
            self.worst_random_error()
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{Int64Array, RecordBatch},
        datatypes::{DataType, Field, Schema},
    };

    use super::*;

    fn block_labels(sizes: &[usize]) -> Vec<StratumKey> {
        sizes
            .iter()
            .enumerate()
            .flat_map(|(i, &n)| std::iter::repeat(StratumKey::Int(i as i64 + 1)).take(n))
            .collect()
    }

    // ========== StratumDistribution tests ==========

    #[test]
    fn test_distribution_counts() {
        let labels = block_labels(&[3, 1]);
        let dist = StratumDistribution::of_all(&labels);
        assert_eq!(dist.total, 4);
        assert_eq!(dist.num_strata(), 2);
        assert_eq!(dist.get_count(&StratumKey::Int(1)), 3);
        assert!((dist.get_proportion(&StratumKey::Int(2)) - 0.25).abs() < 1e-12);
        assert_eq!(dist.get_count(&StratumKey::Int(9)), 0);
    }

    #[test]
    fn test_distribution_of_subset() {
        let labels = block_labels(&[3, 1]);
        let dist = StratumDistribution::from_labels(&labels, &[0, 3, 99]);
        assert_eq!(dist.total, 2);
        assert!((dist.get_proportion(&StratumKey::Int(1)) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_distribution() {
        let dist = StratumDistribution::from_labels(&[], &[]);
        assert_eq!(dist.get_proportion(&StratumKey::Int(1)), 0.0);
    }

    // ========== ProportionReport tests ==========

    #[test]
    fn test_stratified_error_is_zero_on_divisible_strata() {
        let labels = block_labels(&[800, 150, 50]);
        let report = ProportionReport::compare(&labels, 0.2, 42).unwrap();

        assert_eq!(report.total, 1000);
        assert_eq!(report.strata.len(), 3);
        assert!(report.worst_stratified_error() < 1e-9);
        assert!(report.worst_stratified_error() <= report.worst_random_error());

        let first = &report.strata[0];
        assert_eq!(first.stratum, StratumKey::Int(1));
        assert!((first.overall - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_random_split_drifts_for_some_seed() {
        let labels = block_labels(&[800, 150, 50]);
        let drifted = (0..10).any(|seed| {
            ProportionReport::compare(&labels, 0.2, seed)
                .unwrap()
                .worst_random_error()
                > 0.0
        });
        assert!(drifted);
    }

    #[test]
    fn test_report_tolerates_singleton_strata() {
        let labels = block_labels(&[20, 1]);
        let report = ProportionReport::compare(&labels, 0.2, 1).unwrap();
        let singleton = &report.strata[1];
        assert_eq!(singleton.stratified, 0.0);
        assert!((singleton.stratified_error_pct + 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_rejects_invalid_ratio() {
        assert!(ProportionReport::compare(&block_labels(&[10]), 1.5, 1).is_err());
    }

    #[test]
    fn test_for_dataset_and_json() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "income_cat",
            DataType::Int64,
            false,
        )]));
        let cats: Vec<i64> = (0..100).map(|i| i % 4 + 1).collect();
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(cats))]).unwrap();
        let dataset = ArrowDataset::from_batch(batch).unwrap();

        let report = ProportionReport::for_dataset(&dataset, "income_cat", 0.2, 42).unwrap();
        assert_eq!(report.strata.len(), 4);

        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["strata"][0]["stratum"], 1);
        assert_eq!(value["seed"], 42);

        let text = report.to_string();
        assert!(text.contains("stratified"));
        assert!(text.contains("worst |%err|"));

        assert!(matches!(
            ProportionReport::for_dataset(&dataset, "missing", 0.2, 42),
            Err(Error::MissingField { .. })
        ));
    }
}
