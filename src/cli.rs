//! Command-line surface.
//!
//! Parses the flags into [`Options`], the configuration consumed by the
//! sizing policy and the mode drivers. Anything wrong with the command line
//! is reported as an [`OptionsError`], which earns the user a usage prompt.

use std::path::PathBuf;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;

use crate::error::OptionsError;

#[derive(Parser)]
#[command(
    name = "blocksum-rs",
    version,
    about = "Splits the input file in blocks of the requested size, hashes every block and \
             writes the generated chain of digests to the output file or stdout."
)]
struct Cli {
    /// Path to the file to be processed.
    #[arg(short, long, value_name = "PATH")]
    infile: Option<PathBuf>,

    /// Path to the file to write results (stdout if not specified).
    #[arg(short, long, value_name = "PATH")]
    outfile: Option<PathBuf>,

    /// Number of workers calculating hashes (number of hardware threads if not
    /// specified; 0 forces synchronous processing).
    #[arg(short, long, value_name = "NUM")]
    workers: Option<usize>,

    /// Size of block. Scale suffixes are allowed: B, K, M, G (e.g. 128K, 10M).
    #[arg(short, long, value_name = "SIZE", default_value = "1M")]
    blocksize: String,

    /// Order results by block index. Ordering is capped at 100000 blocks;
    /// unordered output is faster and uses less memory.
    #[arg(long)]
    ordered: bool,

    /// Read the input through a memory mapping instead of streaming. Buffered
    /// blocks then cost no physical RAM.
    #[arg(long)]
    mapping: bool,

    /// Positional form of the input path.
    #[arg(value_name = "PATH", conflicts_with = "infile")]
    file: Option<PathBuf>,
}

/// Run configuration, authored here and consumed by sizing and the drivers.
#[derive(Clone, Debug)]
pub struct Options {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    /// Requested worker count; `None` defers to hardware concurrency.
    pub workers: Option<usize>,
    pub block_size: usize,
    pub ordered: bool,
    pub mapping: bool,
}

/// Parses the process command line.
///
/// `--help` and `--version` print to stdout and exit 0 right here; every
/// other parse failure is surfaced as an [`OptionsError`].
pub fn parse() -> Result<Options> {
    match Cli::try_parse() {
        Ok(cli) => cli.into_options().map_err(Into::into),
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => err.exit(),
        Err(err) => Err(OptionsError::new(clap_message(&err)).into()),
    }
}

impl Cli {
    fn into_options(self) -> Result<Options, OptionsError> {
        let input = self
            .infile
            .or(self.file)
            .ok_or_else(|| OptionsError::new("an input file is required"))?;
        let block_size = parse_size(&self.blocksize)?;

        Ok(Options {
            input,
            output: self.outfile,
            workers: self.workers,
            block_size,
            ordered: self.ordered,
            mapping: self.mapping,
        })
    }
}

/// Parses a human size: a decimal count with an optional scale suffix.
///
/// `B` (or no suffix) means bytes, `K`, `M` and `G` scale by powers of 1024.
/// Zero, overflow and anything malformed are rejected.
fn parse_size(value: &str) -> Result<usize, OptionsError> {
    let invalid = || OptionsError::new(format!("invalid blocksize value [{value}]"));

    let digits_end = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    let (digits, suffix) = value.split_at(digits_end);
    let count: usize = digits.parse().map_err(|_| invalid())?;

    let scale: usize = match suffix.to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" => 1024,
        "M" => 1024 * 1024,
        "G" => 1024 * 1024 * 1024,
        _ => return Err(invalid()),
    };

    match count.checked_mul(scale) {
        Some(size) if size > 0 => Ok(size),
        _ => Err(invalid()),
    }
}

// Clap renders multi-line reports; keep the first line for the ERROR: prefix.
fn clap_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let line = rendered.lines().next().unwrap_or("invalid command line");
    line.trim_start_matches("error: ").to_string()
}
