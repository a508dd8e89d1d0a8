//! muestra CLI - Reproducible Train/Test Splitting
//!
//! Command-line interface for muestra operations.

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod basic;
mod split;

/// muestra - Reproducible train/test splitting for Arrow datasets
#[derive(Parser)]
#[command(name = "muestra")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display dataset information
    Info {
        /// Path to dataset file
        path: PathBuf,
    },
    /// Display first N rows of a dataset
    Head {
        /// Path to dataset file
        path: PathBuf,
        /// Number of rows to display
        #[arg(short = 'n', long, default_value = "10")]
        rows: usize,
    },
    /// Display dataset schema
    Schema {
        /// Path to dataset file
        path: PathBuf,
    },
    /// Append a binned category column derived from a numeric column
    Bin {
        /// Input dataset file
        input: PathBuf,
        /// Output dataset file
        output: PathBuf,
        /// Numeric column to bin
        #[arg(short, long)]
        column: String,
        /// Ascending bucket boundaries
        #[arg(short, long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        boundaries: Vec<f64>,
        /// Bucket labels, one per boundary (default 1..=m)
        #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true)]
        labels: Option<Vec<i64>>,
        /// Name of the new column (default <column>_cat)
        #[arg(long)]
        name: Option<String>,
    },
    /// Split a dataset into train and test files
    Split {
        /// Input dataset file
        input: PathBuf,
        /// Output training set file
        #[arg(long)]
        train_output: PathBuf,
        /// Output test set file
        #[arg(long)]
        test_output: PathBuf,
        /// Fraction of rows held out for testing
        #[arg(short = 'r', long, default_value = "0.2")]
        ratio: f64,
        /// Random seed for reproducibility
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Column whose values define the strata
        #[arg(long, conflicts_with = "by_id")]
        stratify: Option<String>,
        /// Number of stratified splits to write
        #[arg(long, requires = "stratify")]
        repeats: Option<usize>,
        /// Keep strata too small for a test row on the train side instead of failing
        #[arg(long, requires = "stratify")]
        lenient: bool,
        /// Identifier column for a hash-based split
        #[arg(long)]
        by_id: Option<String>,
    },
    /// Compare stratum proportions of stratified and random splits
    Compare {
        /// Input dataset file
        input: PathBuf,
        /// Column whose values define the strata
        #[arg(long)]
        stratify: String,
        /// Fraction of rows held out for testing
        #[arg(short = 'r', long, default_value = "0.2")]
        ratio: f64,
        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("muestra=info"));
    // Ignore an already-installed subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Run the muestra CLI.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Info { path } => basic::cmd_info(&path),
        Commands::Head { path, rows } => basic::cmd_head(&path, rows),
        Commands::Schema { path } => basic::cmd_schema(&path),
        Commands::Bin {
            input,
            output,
            column,
            boundaries,
            labels,
            name,
        } => split::cmd_bin(
            &input,
            &output,
            &column,
            boundaries,
            labels,
            name.as_deref(),
        ),
        Commands::Split {
            input,
            train_output,
            test_output,
            ratio,
            seed,
            stratify,
            repeats,
            lenient,
            by_id,
        } => {
            let mode = match (stratify, by_id) {
                (Some(column), _) => split::SplitMode::Stratified {
                    column,
                    repeats: repeats.unwrap_or(1),
                    lenient,
                },
                (None, Some(column)) => split::SplitMode::ById { column },
                (None, None) => split::SplitMode::Uniform,
            };
            split::cmd_split(&input, &train_output, &test_output, ratio, seed, &mode)
        }
        Commands::Compare {
            input,
            stratify,
            ratio,
            seed,
            format,
        } => split::cmd_compare(&input, &stratify, ratio, seed, &format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
