//! Error taxonomy.
//!
//! Most fallible paths use `anyhow` with context, the way the worker and
//! processor modules do. The one class the binary must treat specially is
//! options errors: a bad command line, an unparseable size, or an unusable
//! input file gets a `Try: blocksum-rs --help` prompt in addition to the
//! `ERROR:` line. [`OptionsError`] marks that class so `main` can recognise
//! it by downcast wherever it surfaced.

use thiserror::Error;

/// Failure while assembling run options from the command line and the input
/// file's metadata.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct OptionsError {
    message: String,
}

impl OptionsError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
