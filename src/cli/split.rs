//! Binning, splitting and proportion-report CLI commands.

use std::path::{Path, PathBuf};

use arrow::array::Array;
use tracing::info;

use crate::{
    binning::Binner,
    proportions::ProportionReport,
    split::{validate_ratio, DatasetSplit},
    stratified::{DegenerateStratumPolicy, StratifiedShuffleSplit},
    ArrowDataset, Dataset,
};

use super::basic::{load_dataset, save_dataset};

/// How `split` assigns rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SplitMode {
    /// Uniform random permutation
    Uniform,
    /// Stratified by a label column, possibly repeated
    Stratified {
        column: String,
        repeats: usize,
        lenient: bool,
    },
    /// Hash of a stable identifier column
    ById { column: String },
}

/// `dir/stem.ext` -> `dir/stem_{index}.ext`
pub(crate) fn indexed_path(path: &Path, index: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}_{}", stem, index),
    };
    path.with_file_name(name)
}

/// Append a binned category column.
pub(crate) fn cmd_bin(
    input: &Path,
    output: &Path,
    column: &str,
    boundaries: Vec<f64>,
    labels: Option<Vec<i64>>,
    name: Option<&str>,
) -> crate::Result<()> {
    let binner = match labels {
        Some(labels) => Binner::new(boundaries, labels)?,
        None => Binner::with_default_labels(boundaries)?,
    };
    let output_column = name.map_or_else(|| format!("{}_cat", column), str::to_string);

    let dataset = load_dataset(input)?;
    let binned = binner.apply(&dataset, column, &output_column)?;
    save_dataset(&binned, output)?;

    let unbinned = binned.column(&output_column)?.null_count();
    println!(
        "Binned '{}' into '{}': {} rows ({} outside the bins) -> {}",
        column,
        output_column,
        binned.len(),
        unbinned,
        output.display()
    );

    Ok(())
}

fn write_split(split: &DatasetSplit, train_output: &Path, test_output: &Path) -> crate::Result<()> {
    save_dataset(&split.train, train_output)?;
    save_dataset(&split.test, test_output)?;
    info!(
        train = %train_output.display(),
        test = %test_output.display(),
        "wrote split"
    );
    println!(
        "Split: {} train -> {}, {} test -> {}",
        split.train.len(),
        train_output.display(),
        split.test.len(),
        test_output.display()
    );
    Ok(())
}

/// Split a dataset and write the sides to files.
///
/// With more than one stratified repeat, repeat `i` is written to
/// `stem_i.ext` next to each requested output path.
pub(crate) fn cmd_split(
    input: &Path,
    train_output: &Path,
    test_output: &Path,
    ratio: f64,
    seed: u64,
    mode: &SplitMode,
) -> crate::Result<()> {
    validate_ratio(ratio)?;
    let dataset = load_dataset(input)?;

    match mode {
        SplitMode::Uniform => {
            let split = DatasetSplit::uniform(&dataset, ratio, seed)?;
            write_split(&split, train_output, test_output)
        }
        SplitMode::ById { column } => {
            let split = DatasetSplit::by_id(&dataset, column, ratio)?;
            write_split(&split, train_output, test_output)
        }
        SplitMode::Stratified {
            column,
            repeats,
            lenient,
        } => {
            let policy = if *lenient {
                DegenerateStratumPolicy::AssignToTrain
            } else {
                DegenerateStratumPolicy::Fail
            };
            let splits = StratifiedShuffleSplit::new(ratio)
                .seed(seed)
                .n_repeats(*repeats)
                .degenerate_policy(policy)
                .split(&dataset, column)?;

            if *repeats == 1 {
                for indices in splits {
                    write_split(&indices.materialize(&dataset)?, train_output, test_output)?;
                }
                return Ok(());
            }

            for (i, indices) in splits.enumerate() {
                let split = indices.materialize(&dataset)?;
                write_split(
                    &split,
                    &indexed_path(train_output, i),
                    &indexed_path(test_output, i),
                )?;
            }
            Ok(())
        }
    }
}

/// Print the stratum proportion report.
pub(crate) fn cmd_compare(
    input: &Path,
    stratify: &str,
    ratio: f64,
    seed: u64,
    format: &str,
) -> crate::Result<()> {
    validate_ratio(ratio)?;
    let dataset: ArrowDataset = load_dataset(input)?;
    let report = ProportionReport::for_dataset(&dataset, stratify, ratio, seed)?;

    match format {
        "json" => println!("{}", report.to_json()?),
        "text" => {
            println!(
                "Stratum proportions for '{}' ({} rows, ratio {}, seed {})",
                stratify, report.total, report.ratio, report.seed
            );
            println!();
            println!("{}", report);
        }
        other => return Err(crate::Error::unsupported_format(other)),
    }

    Ok(())
}
