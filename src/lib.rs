//! muestra - Reproducible Train/Test Splitting for Arrow Datasets
//!
//! Partitions tabular data into train and test subsets so that the same
//! seed always yields the same partition, on any platform.
//!
//! # Design Principles
//!
//! 1. **Explicit randomness** - every split takes a seed or a caller-owned
//!    generator; there is no global random state
//! 2. **Index first** - splits are computed as row positions and
//!    materialized with Arrow `take`
//! 3. **Zero-copy** - Arrow `RecordBatch` throughout
//! 4. **Ecosystem aligned** - Arrow 53, Parquet 53
//!
//! # Quick Start
//!
//! ```no_run
//! use muestra::{ArrowDataset, Binner, Dataset, DatasetSplit, StratifiedShuffleSplit};
//!
//! let housing = ArrowDataset::from_csv("data/housing.csv").unwrap();
//!
//! // Bucket a continuous field so it can serve as strata
//! let binner = Binner::with_default_labels(vec![0.0, 1.5, 3.0, 4.5, 6.0]).unwrap();
//! let housing = binner.apply(&housing, "median_income", "income_cat").unwrap();
//!
//! // One stratified split, materialized
//! let split = DatasetSplit::stratified(&housing, "income_cat", 0.2, 42).unwrap();
//! println!("{} train / {} test", split.train.len(), split.test.len());
//!
//! // Several independent stratified splits
//! let splitter = StratifiedShuffleSplit::new(0.2).seed(42).n_repeats(10);
//! for indices in splitter.split(&housing, "income_cat").unwrap() {
//!     println!("{} test rows", indices.test.len());
//! }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
// Allow common test patterns
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::cast_lossless,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::redundant_clone,
        clippy::needless_collect,
        clippy::too_many_lines,
        clippy::float_cmp,
        clippy::similar_names,
        clippy::unreadable_literal
    )
)]
// Allow some pedantic lints for cleaner code
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::map_unwrap_or)]

pub mod binning;
/// CLI module for command-line interface
#[cfg(feature = "cli")]
pub mod cli;
pub mod dataset;
pub mod error;
pub mod proportions;
pub mod split;
pub mod stratified;

// Re-exports for convenience
// Re-export arrow types commonly needed
pub use arrow::{
    array::RecordBatch,
    datatypes::{Schema, SchemaRef},
};
pub use binning::Binner;
pub use dataset::{ArrowDataset, CsvOptions, Dataset};
pub use error::{Error, Result};
pub use proportions::{ProportionReport, StratumComparison, StratumDistribution};
pub use split::{split_by_id, uniform_split, DatasetSplit, IndexSplit};
pub use stratified::{
    stratified_split, DegenerateStratumPolicy, StratifiedShuffleSplit, StratifiedSplits,
    StratumKey,
};
