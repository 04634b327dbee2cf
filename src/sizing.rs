//! Sizing policy: choose the execution mode, worker count and queue capacity.
//!
//! The policy only looks at the request and the input file's metadata; it
//! never reads file contents. Runs that parallelism cannot help (a single
//! block, zero workers requested, or blocks too large to buffer under the
//! soft memory limit) fall through to synchronous processing.

use std::fs;
use std::thread;

use anyhow::Result;
use tracing::debug;

use crate::cli::Options;
use crate::config::{QUEUE_LIMIT, SOFT_MEMORY_LIMIT};
use crate::error::OptionsError;

/// How the input file will be read and hashed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Single-threaded, no channels; one hasher fed from a refill buffer.
    Sync,
    /// Producer reads blocks into owned buffers and feeds a worker pipeline.
    Streaming,
    /// Producer maps the file and feeds zero-copy windows to the pipeline.
    Mapped,
}

/// The chosen shape of one run.
#[derive(Clone, Copy, Debug)]
pub struct Plan {
    pub mode: Mode,
    /// Hashing workers; zero in [`Mode::Sync`].
    pub workers: usize,
    /// Capacity of every pipeline channel; zero in [`Mode::Sync`].
    pub queue: usize,
    pub blocks: u64,
    pub file_size: u64,
}

impl Plan {
    pub fn from_options(options: &Options) -> Result<Self> {
        let metadata = fs::metadata(&options.input).map_err(|err| {
            OptionsError::new(format!("failed to read input file [{}]: {err}", options.input.display()))
        })?;
        let file_size = metadata.len();
        if file_size == 0 {
            return Err(OptionsError::new("input file is empty").into());
        }

        let blocks = file_size.div_ceil(options.block_size as u64);
        let requested = options.workers.unwrap_or_else(default_workers);

        let plan = if blocks == 1 || requested == 0 {
            Self::sync(blocks, file_size)
        } else if options.mapping {
            // Buffered jobs carry no heap, so the queue gets its cap outright.
            Self::parallel(Mode::Mapped, requested, QUEUE_LIMIT, blocks, file_size)
        } else {
            // Shrink the queue until every buffered block fits under the soft
            // memory limit; blocks too large even for a one-slot queue are
            // processed synchronously instead.
            let queue = (SOFT_MEMORY_LIMIT / options.block_size).saturating_sub(1).min(QUEUE_LIMIT);
            if queue == 0 {
                Self::sync(blocks, file_size)
            } else {
                Self::parallel(Mode::Streaming, requested, queue, blocks, file_size)
            }
        };

        debug!(
            mode = ?plan.mode,
            workers = plan.workers,
            queue = plan.queue,
            blocks = plan.blocks,
            "sizing plan"
        );
        Ok(plan)
    }

    fn sync(blocks: u64, file_size: u64) -> Self {
        Self { mode: Mode::Sync, workers: 0, queue: 0, blocks, file_size }
    }

    fn parallel(mode: Mode, requested: usize, queue: usize, blocks: u64, file_size: u64) -> Self {
        // A worker beyond the queue depth or the block count would only sit
        // idle holding no slot.
        let workers = requested.min(queue).min(usize::try_from(blocks).unwrap_or(usize::MAX));
        Self { mode, workers, queue, blocks, file_size }
    }
}

/// Default worker count: the hardware thread count, at least one.
pub fn default_workers() -> usize {
    thread::available_parallelism().map(|p| p.get()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    fn options(input: PathBuf, block_size: usize, workers: Option<usize>, mapping: bool) -> Options {
        Options { input, output: None, workers, block_size, ordered: false, mapping }
    }

    fn file_with(len: u64) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        file.as_file().set_len(len).unwrap();
        file
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let err = Plan::from_options(&options(file.path().into(), 1024, Some(4), false)).unwrap_err();

        assert!(err.is::<crate::error::OptionsError>());
        assert_eq!(err.to_string(), "input file is empty");
    }

    #[test]
    fn test_missing_file_is_an_options_error() {
        let err =
            Plan::from_options(&options(PathBuf::from("/no/such/file"), 1024, Some(4), false)).unwrap_err();

        assert!(err.is::<crate::error::OptionsError>());
    }

    #[test]
    fn test_single_block_forces_sync() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"short").unwrap();

        let plan = Plan::from_options(&options(file.path().into(), 1024, Some(4), false)).unwrap();

        assert_eq!(plan.mode, Mode::Sync);
        assert_eq!(plan.blocks, 1);
    }

    #[test]
    fn test_zero_workers_forces_sync() {
        let file = file_with(8192);

        let plan = Plan::from_options(&options(file.path().into(), 1024, Some(0), false)).unwrap();

        assert_eq!(plan.mode, Mode::Sync);
        assert_eq!(plan.blocks, 8);
    }

    #[test]
    fn test_streaming_queue_respects_memory_limit() {
        let file = file_with(10 * 1024 * 1024);
        let block_size = 4 * 1024 * 1024;

        let plan = Plan::from_options(&options(file.path().into(), block_size, Some(2), false)).unwrap();

        assert_eq!(plan.mode, Mode::Streaming);
        assert_eq!(plan.queue, SOFT_MEMORY_LIMIT / block_size - 1);
    }

    #[test]
    fn test_streaming_queue_is_capped() {
        let file = file_with(4096);

        let plan = Plan::from_options(&options(file.path().into(), 1, Some(4), false)).unwrap();

        assert_eq!(plan.mode, Mode::Streaming);
        assert_eq!(plan.queue, QUEUE_LIMIT);
    }

    #[test]
    fn test_oversized_block_falls_through_to_sync() {
        // A sparse file: two blocks, each too large to buffer even one of
        // under the soft memory limit.
        let file = file_with(1_400_000_000);
        let block_size = 700_000_000;

        let plan = Plan::from_options(&options(file.path().into(), block_size, Some(4), false)).unwrap();

        assert_eq!(plan.mode, Mode::Sync);
        assert_eq!(plan.blocks, 2);
    }

    #[test]
    fn test_mapping_gets_maximum_queue() {
        let file = file_with(1_400_000_000);

        let plan =
            Plan::from_options(&options(file.path().into(), 700_000_000, Some(4), true)).unwrap();

        assert_eq!(plan.mode, Mode::Mapped);
        assert_eq!(plan.queue, QUEUE_LIMIT);
        assert_eq!(plan.workers, 2, "workers are clamped to the block count");
    }

    #[test]
    fn test_workers_clamped_to_blocks() {
        let file = file_with(3 * 1024);

        let plan = Plan::from_options(&options(file.path().into(), 1024, Some(64), false)).unwrap();

        assert_eq!(plan.workers, 3);
    }

    #[test]
    fn test_default_workers_is_positive() {
        assert!(default_workers() >= 1);
    }
}
