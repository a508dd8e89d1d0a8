//! Stratified shuffle splitting.
//!
//! Records are grouped by the value of a categorical field and each group is
//! split on its own, so every stratum keeps (up to rounding) the same share
//! of the test set as of the whole dataset. One generator seeded from the
//! configured seed drives every stratum of every repeat; repeats therefore
//! differ from each other while the whole sequence stays reproducible.
//!
//! # Example
//!
//! ```ignore
//! use muestra::stratified::StratifiedShuffleSplit;
//!
//! let splitter = StratifiedShuffleSplit::new(0.2).seed(42).n_repeats(5);
//! for split in splitter.split(&housing, "income_cat")? {
//!     println!("{} train / {} test", split.train.len(), split.test.len());
//! }
//! ```

use std::{collections::BTreeMap, fmt};

use arrow::{
    array::{
        Array, Int16Array, Int32Array, Int64Array, Int8Array, LargeStringArray, StringArray,
        UInt16Array, UInt32Array, UInt64Array, UInt8Array,
    },
    datatypes::DataType,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    split::{shuffle, split_rng, test_size, validate_ratio, IndexSplit, SplitRng},
    ArrowDataset,
};

/// Label identifying one stratum.
///
/// Integer labels order before text labels; within a kind the natural order
/// applies. Strata are always visited in this order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum StratumKey {
    /// Integer label (from any signed or unsigned integer column)
    Int(i64),
    /// Text label (from a string column)
    Text(String),
}

impl StratumKey {
    /// Bytes hashed when the key serves as a row identifier.
    pub fn to_id_bytes(&self) -> Vec<u8> {
        match self {
            Self::Int(v) => v.to_le_bytes().to_vec(),
            Self::Text(s) => s.as_bytes().to_vec(),
        }
    }
}

impl fmt::Display for StratumKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for StratumKey {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for StratumKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// What to do with a stratum too small to appear on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegenerateStratumPolicy {
    /// Reject the whole split with [`Error::DegenerateStratum`].
    #[default]
    Fail,
    /// Keep the stratum; the floor rule puts all of its members in train.
    AssignToTrain,
}

/// Members of one stratum, as ascending row positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stratum {
    /// The stratum label
    pub key: StratumKey,
    /// Row positions carrying the label
    pub members: Vec<usize>,
}

impl Stratum {
    /// Number of records in the stratum.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when the stratum has no records.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Groups row positions by label, in ascending label order.
pub fn group_by_stratum(labels: &[StratumKey]) -> Vec<Stratum> {
    let mut groups: BTreeMap<&StratumKey, Vec<usize>> = BTreeMap::new();
    for (position, key) in labels.iter().enumerate() {
        groups.entry(key).or_default().push(position);
    }

    groups
        .into_iter()
        .map(|(key, members)| Stratum {
            key: key.clone(),
            members,
        })
        .collect()
}

macro_rules! int_keys {
    ($array:expr, $ty:ty, $column:expr) => {{
        let arr = $array
            .as_any()
            .downcast_ref::<$ty>()
            .ok_or_else(|| Error::invalid_argument(concat!("Failed to downcast ", stringify!($ty))))?;
        arr.iter()
            .enumerate()
            .map(|(row, v)| {
                let v = v.ok_or_else(|| null_value($column, row))?;
                i64::try_from(v).map(StratumKey::Int).map_err(|_| {
                    Error::invalid_argument(format!(
                        "Value {v} in field '{}' does not fit in i64",
                        $column
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()
    }};
}

fn null_value(column: &str, row: usize) -> Error {
    Error::invalid_argument(format!("Field '{column}' has a null value at row {row}"))
}

/// Reads one label per row from an integer or string column.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] for null values and for columns that
/// are neither integer nor string typed. Numeric fields have to be binned
/// before they can serve as strata.
pub fn keys_from_array(array: &dyn Array, column: &str) -> Result<Vec<StratumKey>> {
    match array.data_type() {
        DataType::Int8 => int_keys!(array, Int8Array, column),
        DataType::Int16 => int_keys!(array, Int16Array, column),
        DataType::Int32 => int_keys!(array, Int32Array, column),
        DataType::Int64 => int_keys!(array, Int64Array, column),
        DataType::UInt8 => int_keys!(array, UInt8Array, column),
        DataType::UInt16 => int_keys!(array, UInt16Array, column),
        DataType::UInt32 => int_keys!(array, UInt32Array, column),
        DataType::UInt64 => int_keys!(array, UInt64Array, column),
        DataType::Utf8 => {
            let arr = array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| Error::invalid_argument("Failed to downcast StringArray"))?;
            arr.iter()
                .enumerate()
                .map(|(row, v)| {
                    v.map(StratumKey::from)
                        .ok_or_else(|| null_value(column, row))
                })
                .collect()
        }
        DataType::LargeUtf8 => {
            let arr = array
                .as_any()
                .downcast_ref::<LargeStringArray>()
                .ok_or_else(|| Error::invalid_argument("Failed to downcast LargeStringArray"))?;
            arr.iter()
                .enumerate()
                .map(|(row, v)| {
                    v.map(StratumKey::from)
                        .ok_or_else(|| null_value(column, row))
                })
                .collect()
        }
        dt => Err(Error::invalid_argument(format!(
            "Unsupported type {dt:?} for field '{column}'; expected integer or string labels"
        ))),
    }
}

/// Reads the labels of `field` from a dataset.
///
/// # Errors
/// Returns [`Error::MissingField`] if the field is absent, otherwise the
/// errors of [`keys_from_array`].
pub fn dataset_keys(dataset: &ArrowDataset, field: &str) -> Result<Vec<StratumKey>> {
    let column = dataset.column(field)?;
    keys_from_array(column.as_ref(), field)
}

/// Configuration for stratified shuffle splits.
///
/// Defaults: seed 42, one repeat, [`DegenerateStratumPolicy::Fail`].
#[derive(Debug, Clone)]
pub struct StratifiedShuffleSplit {
    test_ratio: f64,
    seed: u64,
    n_repeats: usize,
    policy: DegenerateStratumPolicy,
}

impl StratifiedShuffleSplit {
    /// Creates a splitter holding out `test_ratio` of every stratum.
    pub fn new(test_ratio: f64) -> Self {
        Self {
            test_ratio,
            seed: 42,
            n_repeats: 1,
            policy: DegenerateStratumPolicy::Fail,
        }
    }

    /// Sets the generator seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets how many independent splits to produce.
    #[must_use]
    pub fn n_repeats(mut self, n_repeats: usize) -> Self {
        self.n_repeats = n_repeats;
        self
    }

    /// Sets the handling of single-member strata.
    #[must_use]
    pub fn degenerate_policy(mut self, policy: DegenerateStratumPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the configured test ratio.
    pub fn test_ratio(&self) -> f64 {
        self.test_ratio
    }

    /// Returns the configured seed.
    pub fn get_seed(&self) -> u64 {
        self.seed
    }

    /// Returns the configured number of repeats.
    pub fn get_n_repeats(&self) -> usize {
        self.n_repeats
    }

    /// Returns the configured degenerate-stratum policy.
    pub fn get_degenerate_policy(&self) -> DegenerateStratumPolicy {
        self.policy
    }

    fn validate(&self) -> Result<()> {
        validate_ratio(self.test_ratio)?;
        if self.n_repeats == 0 {
            return Err(Error::invalid_argument("n_repeats must be at least 1"));
        }
        Ok(())
    }

    /// Splits a dataset stratified by `strata_field`.
    ///
    /// All validation happens here; the returned iterator cannot fail.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for a bad ratio, zero repeats or
    /// unusable labels, [`Error::MissingField`] if the field is absent, and
    /// [`Error::DegenerateStratum`] under the `Fail` policy.
    pub fn split(&self, dataset: &ArrowDataset, strata_field: &str) -> Result<StratifiedSplits> {
        self.validate()?;
        let labels = dataset_keys(dataset, strata_field)?;
        self.split_labels(&labels)
    }

    /// Splits positions `0..labels.len()` stratified by `labels`.
    ///
    /// # Errors
    /// As [`Self::split`], minus the field lookup.
    pub fn split_labels(&self, labels: &[StratumKey]) -> Result<StratifiedSplits> {
        self.validate()?;

        let strata = group_by_stratum(labels);

        if self.test_ratio > 0.0 && self.test_ratio < 1.0 {
            for stratum in strata.iter().filter(|s| is_degenerate(s.len(), self.test_ratio)) {
                match self.policy {
                    DegenerateStratumPolicy::Fail => {
                        return Err(Error::degenerate_stratum(&stratum.key, stratum.len()));
                    }
                    DegenerateStratumPolicy::AssignToTrain => {
                        warn!(
                            stratum = %stratum.key,
                            size = stratum.len(),
                            "degenerate stratum kept on the train side"
                        );
                    }
                }
            }
        }

        debug!(
            n = labels.len(),
            strata = strata.len(),
            ratio = self.test_ratio,
            seed = self.seed,
            repeats = self.n_repeats,
            "stratified split"
        );

        Ok(StratifiedSplits {
            strata,
            ratio: self.test_ratio,
            rng: split_rng(self.seed),
            remaining: self.n_repeats,
        })
    }
}

/// A stratum is degenerate when the floor rule leaves one of its sides
/// empty at a ratio strictly inside `(0, 1)`.
fn is_degenerate(len: usize, ratio: f64) -> bool {
    let k = test_size(len, ratio);
    k == 0 || k == len
}

/// Lazy sequence of stratified splits.
///
/// Yields exactly the configured number of repeats, then `None`. Consuming
/// it advances a shared generator, so it cannot be restarted; build a new
/// one with the same seed to replay the sequence.
#[derive(Debug)]
pub struct StratifiedSplits {
    strata: Vec<Stratum>,
    ratio: f64,
    rng: SplitRng,
    remaining: usize,
}

impl StratifiedSplits {
    /// The strata being split, in visiting order.
    pub fn strata(&self) -> &[Stratum] {
        &self.strata
    }
}

impl Iterator for StratifiedSplits {
    type Item = IndexSplit;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let n: usize = self.strata.iter().map(Stratum::len).sum();
        let mut split = IndexSplit {
            train: Vec::with_capacity(n),
            test: Vec::with_capacity(n),
        };

        for stratum in &self.strata {
            let mut members = stratum.members.clone();
            shuffle(&mut members, &mut self.rng);
            let k = test_size(members.len(), self.ratio);
            split.test.extend_from_slice(&members[..k]);
            split.train.extend_from_slice(&members[k..]);
        }

        Some(split)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StratifiedSplits {}

/// Single stratified split with the fail-fast policy.
///
/// # Errors
/// As [`StratifiedShuffleSplit::split`].
pub fn stratified_split(
    dataset: &ArrowDataset,
    strata_field: &str,
    ratio: f64,
    seed: u64,
) -> Result<IndexSplit> {
    StratifiedShuffleSplit::new(ratio)
        .seed(seed)
        .split(dataset, strata_field)?
        .next()
        .ok_or_else(|| Error::invalid_argument("stratified split produced no partition"))
}
