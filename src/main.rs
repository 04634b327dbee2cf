use std::process;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use blocksum_rs::error::OptionsError;
use blocksum_rs::{cli, processor};

fn run() -> Result<()> {
    let options = cli::parse()?;
    processor::run(&options)
}

fn main() {
    // Diagnostics go to stderr so they never mix with result records.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    if let Err(err) = run() {
        eprintln!("ERROR: {err:#}");
        if err.is::<OptionsError>() {
            eprintln!("Try: blocksum-rs --help");
        }
        process::exit(-1);
    }
}
