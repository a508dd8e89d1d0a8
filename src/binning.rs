//! Binning of numeric values into ordinal categories.
//!
//! A continuous field (median income, say) is turned into a small number of
//! integer-labelled buckets so that it can serve as a stratum field.
//!
//! Buckets are closed on the right: with boundaries `b0 < b1 < ... < bm`,
//! the first bucket is `[b0, b1]`, bucket `i` is `(b_i, b_{i+1}]` and the
//! last one is `(bm, +inf)`.
//!
//! # Example
//!
//! ```ignore
//! use muestra::binning::Binner;
//!
//! let binner = Binner::with_default_labels(vec![0.0, 1.5, 3.0, 4.5, 6.0])?;
//! assert_eq!(binner.bin(1.5), Some(1));
//! assert_eq!(binner.bin(10.0), Some(5));
//!
//! let housing = binner.apply(&housing, "median_income", "income_cat")?;
//! ```

use std::sync::Arc;

use arrow::{
    array::{Array, Float64Array, Int64Array},
    compute::cast,
    datatypes::{DataType, Field},
};
use tracing::debug;

use crate::{
    dataset::{ArrowDataset, Dataset},
    error::{Error, Result},
};

/// Maps numeric values to ordinal labels by boundary search.
#[derive(Debug, Clone, PartialEq)]
pub struct Binner {
    boundaries: Vec<f64>,
    labels: Vec<i64>,
}

impl Binner {
    /// Creates a binner with one label per bucket.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if `boundaries` is empty, contains
    /// a non-finite value or is not strictly increasing, or if `labels` does
    /// not have one entry per boundary.
    pub fn new(boundaries: Vec<f64>, labels: Vec<i64>) -> Result<Self> {
        if boundaries.is_empty() {
            return Err(Error::invalid_argument("Bin boundaries must not be empty"));
        }
        if let Some(b) = boundaries.iter().find(|b| !b.is_finite()) {
            return Err(Error::invalid_argument(format!(
                "Bin boundaries must be finite, got {b}"
            )));
        }
        if let Some(w) = boundaries.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::invalid_argument(format!(
                "Bin boundaries must be strictly increasing, got {} before {}",
                w[0], w[1]
            )));
        }
        if labels.len() != boundaries.len() {
            return Err(Error::invalid_argument(format!(
                "Expected {} bin labels, got {}",
                boundaries.len(),
                labels.len()
            )));
        }

        Ok(Self { boundaries, labels })
    }

    /// Creates a binner labelling the buckets `1, 2, ..., m`.
    ///
    /// # Errors
    /// As [`Binner::new`].
    pub fn with_default_labels(boundaries: Vec<f64>) -> Result<Self> {
        let labels = (1..=boundaries.len() as i64).collect();
        Self::new(boundaries, labels)
    }

    /// Bucket boundaries, ascending.
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Bucket labels, in bucket order.
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Label of the bucket containing `value`.
    ///
    /// Returns `None` for NaN and for values below the first boundary.
    pub fn bin(&self, value: f64) -> Option<i64> {
        if value.is_nan() || value < self.boundaries[0] {
            return None;
        }
        // Number of interior boundaries strictly below the value
        let bucket = self.boundaries[1..].partition_point(|&b| b < value);
        self.labels.get(bucket).copied()
    }

    /// Appends a nullable `Int64` column of bucket labels computed from
    /// `source_column`.
    ///
    /// Any numeric source type is accepted. Nulls and values outside the
    /// bucket range become nulls.
    ///
    /// # Errors
    /// Returns [`Error::MissingField`] if `source_column` is absent and
    /// [`Error::InvalidArgument`] if it is not numeric or if
    /// `output_column` already exists.
    pub fn apply(
        &self,
        dataset: &ArrowDataset,
        source_column: &str,
        output_column: &str,
    ) -> Result<ArrowDataset> {
        let source = dataset.column(source_column)?;
        if !source.data_type().is_numeric() {
            return Err(Error::invalid_argument(format!(
                "Cannot bin non-numeric field '{}' of type {:?}",
                source_column,
                source.data_type()
            )));
        }
        if dataset.schema().field_with_name(output_column).is_ok() {
            return Err(Error::invalid_argument(format!(
                "Field '{output_column}' already exists"
            )));
        }

        let as_float = cast(source.as_ref(), &DataType::Float64)?;
        let values = as_float
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| Error::invalid_argument("Failed to downcast Float64Array"))?;

        let labels: Int64Array = values.iter().map(|v| v.and_then(|v| self.bin(v))).collect();

        debug!(
            source = source_column,
            output = output_column,
            rows = labels.len(),
            unbinned = labels.null_count(),
            "binned column"
        );

        dataset.with_column(
            Field::new(output_column, DataType::Int64, true),
            Arc::new(labels),
        )
    }
}
