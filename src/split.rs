// Allow casts for size calculations - these are intentional and safe for
// dataset sizes
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

//! Reproducible train/test splitting.
//!
//! Every split is driven by an explicit generator: [`split_rng`] builds a
//! `ChaCha8Rng` from a `u64` seed, and permutations are a Fisher-Yates pass
//! that draws swap partners as `u64`. Together these fix the output of a
//! seeded split bit for bit, independent of platform word size.
//!
//! # Example
//!
//! ```ignore
//! use muestra::split::{uniform_split, DatasetSplit};
//!
//! // Index-level split: 20% of 1000 rows go to test
//! let split = uniform_split(1000, 0.2, 42)?;
//! assert_eq!(split.test.len(), 200);
//!
//! // Materialized split of a loaded dataset
//! let split = DatasetSplit::uniform(&housing, 0.2, 42)?;
//!
//! // Stratified by a binned income column
//! let split = DatasetSplit::stratified(&housing, "income_cat", 0.2, 42)?;
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    error::{Error, Result},
    stratified::stratified_split,
    ArrowDataset, Dataset,
};

/// The generator every seeded split uses.
pub type SplitRng = ChaCha8Rng;

/// Builds the split generator for `seed`.
pub fn split_rng(seed: u64) -> SplitRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Checks that a test ratio lies in `[0, 1]`.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] for NaN, infinities and values outside
/// the closed unit interval.
pub fn validate_ratio(ratio: f64) -> Result<()> {
    if ratio.is_finite() && (0.0..=1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "Split ratio must lie in [0, 1], got {ratio}"
        )))
    }
}

/// Number of records a ratio assigns to the test side: `floor(n * ratio)`.
pub(crate) fn test_size(n: usize, ratio: f64) -> usize {
    (((n as f64) * ratio).floor() as usize).min(n)
}

/// Shuffles `items` in place with a Fisher-Yates pass from the back.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i as u64) as usize;
        items.swap(i, j);
    }
}

/// Returns a uniformly random permutation of `0..n`.
pub fn permutation<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    shuffle(&mut indices, rng);
    indices
}

/// Row positions of a train/test partition.
///
/// `train` and `test` are disjoint and together cover `0..n` exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexSplit {
    /// Positions assigned to the training side.
    pub train: Vec<usize>,
    /// Positions held out for testing.
    pub test: Vec<usize>,
}

impl IndexSplit {
    /// Create a split from its two sides.
    pub fn new(train: Vec<usize>, test: Vec<usize>) -> Self {
        Self { train, test }
    }

    /// Total number of positions on both sides.
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    /// True when both sides are empty.
    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.test.is_empty()
    }

    /// Fraction of positions on the test side (0.0 for an empty split).
    pub fn test_fraction(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.test.len() as f64 / self.len() as f64
        }
    }

    /// Checks that the sides partition `0..n`.
    pub fn is_partition_of(&self, n: usize) -> bool {
        if self.len() != n {
            return false;
        }
        let mut seen = vec![false; n];
        for &i in self.train.iter().chain(&self.test) {
            match seen.get_mut(i) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }

    /// Materializes the split against the dataset it was computed for.
    ///
    /// # Errors
    /// Returns an error if a position is out of range for `dataset`.
    pub fn materialize(&self, dataset: &ArrowDataset) -> Result<DatasetSplit> {
        Ok(DatasetSplit {
            train: dataset.take(&self.train)?,
            test: dataset.take(&self.test)?,
        })
    }
}

/// Splits `0..n` into train and test positions using a generator seeded
/// from `seed`.
///
/// The first `floor(n * ratio)` entries of a random permutation form the
/// test side, the rest the train side. `n == 0` yields two empty sides.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] if `ratio` is outside `[0, 1]`.
pub fn uniform_split(n: usize, ratio: f64, seed: u64) -> Result<IndexSplit> {
    validate_ratio(ratio)?;
    let split = uniform_split_with_rng(n, ratio, &mut split_rng(seed))?;
    debug!(
        n,
        ratio,
        seed,
        train = split.train.len(),
        test = split.test.len(),
        "uniform split"
    );
    Ok(split)
}

/// [`uniform_split`] with a caller-owned generator.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] if `ratio` is outside `[0, 1]`; the
/// generator is not advanced in that case.
pub fn uniform_split_with_rng<R: Rng + ?Sized>(
    n: usize,
    ratio: f64,
    rng: &mut R,
) -> Result<IndexSplit> {
    validate_ratio(ratio)?;

    let mut indices = permutation(n, rng);
    let train = indices.split_off(test_size(n, ratio));

    Ok(IndexSplit {
        train,
        test: indices,
    })
}

/// Splits a dataset by hashing a stable identifier column.
///
/// A row goes to the test side when the SHA-256 digest of its identifier,
/// read as a fraction in `[0, 1)`, is below `ratio`. The side a row lands on
/// depends only on its identifier, so rows keep their side when the dataset
/// is refreshed with new records. Both sides list positions in dataset
/// order.
///
/// Integer identifiers are hashed as the 8 little-endian bytes of their
/// `i64` value, string identifiers as their UTF-8 bytes.
///
/// # Errors
/// Returns an error if `ratio` is invalid, the column is missing, or an
/// identifier is null or of an unsupported type.
pub fn split_by_id(dataset: &ArrowDataset, id_column: &str, ratio: f64) -> Result<IndexSplit> {
    validate_ratio(ratio)?;

    let ids = dataset.column(id_column)?;
    let keys = crate::stratified::keys_from_array(ids.as_ref(), id_column)?;

    let mut split = IndexSplit::default();
    for (position, key) in keys.iter().enumerate() {
        if id_hash_fraction(&key.to_id_bytes()) < ratio {
            split.test.push(position);
        } else {
            split.train.push(position);
        }
    }

    debug!(
        column = id_column,
        ratio,
        train = split.train.len(),
        test = split.test.len(),
        "id-hash split"
    );
    Ok(split)
}

/// Maps identifier bytes to a fraction in `[0, 1)`.
pub(crate) fn id_hash_fraction(bytes: &[u8]) -> f64 {
    let digest = Sha256::digest(bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let bits = u64::from_be_bytes(prefix) >> 11;
    bits as f64 / (1u64 << 53) as f64
}

/// Train and test datasets produced from an [`IndexSplit`].
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    /// Training dataset
    pub train: ArrowDataset,
    /// Test/holdout dataset
    pub test: ArrowDataset,
}

impl DatasetSplit {
    /// Create a split from already-materialized sides.
    pub fn new(train: ArrowDataset, test: ArrowDataset) -> Self {
        Self { train, test }
    }

    /// Get training data
    pub fn train(&self) -> &ArrowDataset {
        &self.train
    }

    /// Get test data
    pub fn test(&self) -> &ArrowDataset {
        &self.test
    }

    /// Uniform random split of a dataset.
    ///
    /// # Errors
    /// Returns an error if `ratio` is outside `[0, 1]`.
    pub fn uniform(dataset: &ArrowDataset, ratio: f64, seed: u64) -> Result<Self> {
        uniform_split(dataset.len(), ratio, seed)?.materialize(dataset)
    }

    /// Stratified split preserving the share of each value of
    /// `strata_field`.
    ///
    /// # Errors
    /// Returns an error if `ratio` is invalid, the field is missing, or a
    /// stratum is too small to receive any test row.
    pub fn stratified(
        dataset: &ArrowDataset,
        strata_field: &str,
        ratio: f64,
        seed: u64,
    ) -> Result<Self> {
        stratified_split(dataset, strata_field, ratio, seed)?.materialize(dataset)
    }

    /// Split keyed on a stable identifier column; see [`split_by_id`].
    ///
    /// # Errors
    /// Returns an error if `ratio` is invalid or the identifier column is
    /// missing, null or of an unsupported type.
    pub fn by_id(dataset: &ArrowDataset, id_column: &str, ratio: f64) -> Result<Self> {
        split_by_id(dataset, id_column, ratio)?.materialize(dataset)
    }
}
