//! muestra CLI - Reproducible Train/Test Splitting
//!
//! Command-line interface for muestra operations.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::process::ExitCode;

fn main() -> ExitCode {
    muestra::cli::run()
}
