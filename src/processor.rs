//! The producer / mode driver.
//!
//! Coordinates one whole run: sizes the pipeline, selects the result sink,
//! reads the input file in the chosen mode and reports the outcome. The
//! streaming and mapped drivers own the pipeline lifecycle end to end:
//! feed jobs, close the input channel, join the pools, and let `wait`
//! re-raise the first worker failure.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::{Context, Result};
use memmap2::Mmap;
use tracing::debug;

use crate::cli::Options;
use crate::config::SYNC_BUFFER_SIZE;
use crate::hasher::{Algorithm, BlockHasher};
use crate::sink::{ordered_sink, unordered_sink, OrderedResults, ResultSink, ResultWriter};
use crate::sizing::{Mode, Plan};
use crate::types::{HashResult, MappedJob, OwnedJob};
use crate::worker::{SinkPool, WorkerPool};

/// Runs one complete hashing pass over the input file.
pub fn run(options: &Options) -> Result<()> {
    let plan = Plan::from_options(options)?;

    let stream: Box<dyn Write + Send> = match &options.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to open output file [{}]", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    };
    let writer = ResultWriter::new(stream);

    // Ordered runs accumulate into a collector the driver flushes at the end;
    // unordered runs write straight through.
    let collector = options.ordered.then(|| Arc::new(Mutex::new(OrderedResults::new())));
    let sink = match &collector {
        Some(collector) => ordered_sink(collector),
        None => unordered_sink(&writer),
    };

    let hash = BlockHasher::new(Algorithm::Crc16);

    println!("Running: queue [{}], workers [{}]...", plan.queue, plan.workers);
    let started = Instant::now();

    match plan.mode {
        Mode::Sync => run_sync(options, hash, sink)?,
        Mode::Streaming => run_streaming(options, &plan, hash, sink)?,
        Mode::Mapped => run_mapped(options, &plan, hash, sink)?,
    }

    if let Some(collector) = collector {
        collector.lock().unwrap_or_else(PoisonError::into_inner).write_to(&writer)?;
    }
    writer.flush()?;

    let label = if options.mapping { "mapping" } else { "streaming" };
    println!("Done [with {label}] in {}", started.elapsed().as_micros());

    Ok(())
}

/// Synchronous fallback: no workers, no channels.
///
/// Refills a fixed buffer and feeds the single hasher, emitting a result
/// every time a block boundary passes through the buffer.
fn run_sync(options: &Options, mut hash: BlockHasher, mut sink: ResultSink) -> Result<()> {
    let mut file = open_input(options)?;
    let mut buffer = vec![0u8; SYNC_BUFFER_SIZE];
    let mut index = 0u64;
    let mut remainder = options.block_size;

    loop {
        let read = file.read(&mut buffer).context("failed to read input file")?;
        if read == 0 {
            break;
        }

        let mut bytes = &buffer[..read];
        while !bytes.is_empty() {
            let take = remainder.min(bytes.len());
            hash.process_bytes(&bytes[..take]);
            bytes = &bytes[take..];
            remainder -= take;

            if remainder == 0 {
                sink(HashResult { index, digest: hash.finish() })?;
                index += 1;
                remainder = options.block_size;
            }
        }
    }

    // The trailing short block, if any bytes were absorbed past a boundary.
    if remainder != options.block_size {
        sink(HashResult { index, digest: hash.finish() })?;
    }

    Ok(())
}

/// Streaming mode: read blocks into owned buffers and feed the pipeline.
///
/// Peak memory is bounded by `block_size * (queue + workers + 1)`, which the
/// sizing policy keeps under the soft memory limit.
fn run_streaming(options: &Options, plan: &Plan, mut hash: BlockHasher, sink: ResultSink) -> Result<()> {
    let mut workers = WorkerPool::new(plan.workers, plan.queue, move |job: OwnedJob| {
        hash.process_bytes(&job.data);
        Ok(HashResult { index: job.index, digest: hash.finish() })
    });
    let mut resulter = SinkPool::new(plan.queue, &workers, sink);

    let input = workers.input();
    let terminator = resulter.terminator();

    let mut file = open_input(options)?;
    let mut index = 0u64;
    while !terminator.is_closed() {
        let mut data = vec![0u8; options.block_size];
        let read = read_block(&mut file, &mut data)?;
        if read == 0 {
            break;
        }
        data.truncate(read);

        // A rejected push means the pipeline tore down under us; the cause
        // surfaces in wait() below.
        if input.push(OwnedJob { index, data }).is_err() {
            break;
        }
        index += 1;
    }
    debug!(blocks_fed = index, "input channel closing");

    input.close();
    workers.wait()?;
    resulter.wait()?;
    Ok(())
}

/// Mapped mode: hash zero-copy windows of a read-only memory mapping.
///
/// Jobs carry a handle to the region, and the pools are joined before the
/// driver's own handle drops, so no worker can outlive the mapping.
fn run_mapped(options: &Options, plan: &Plan, mut hash: BlockHasher, sink: ResultSink) -> Result<()> {
    let file = open_input(options)?;
    let region = unsafe { Mmap::map(&file) }
        .with_context(|| format!("failed to map file [{}]", options.input.display()))?;
    let region = Arc::new(region);

    let mut workers = WorkerPool::new(plan.workers, plan.queue, move |job: MappedJob| {
        hash.process_bytes(job.bytes());
        Ok(HashResult { index: job.index(), digest: hash.finish() })
    });
    let mut resulter = SinkPool::new(plan.queue, &workers, sink);

    let input = workers.input();
    let terminator = resulter.terminator();

    let size = region.len();
    let mut offset = 0usize;
    let mut index = 0u64;
    while offset < size && !terminator.is_closed() {
        let len = options.block_size.min(size - offset);
        let job = MappedJob::new(index, Arc::clone(&region), offset, len);
        if input.push(job).is_err() {
            break;
        }
        index += 1;
        offset += len;
    }
    debug!(blocks_fed = index, "input channel closing");

    input.close();
    workers.wait()?;
    resulter.wait()?;
    Ok(())
}

fn open_input(options: &Options) -> Result<File> {
    File::open(&options.input).with_context(|| format!("failed to open input file [{}]", options.input.display()))
}

/// Reads until `buffer` is full or the file ends, returning the byte count.
fn read_block(file: &mut File, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = file.read(&mut buffer[filled..]).context("failed to read input file")?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use anyhow::bail;

    use super::*;

    fn options_for(file: &tempfile::NamedTempFile, block_size: usize, workers: usize) -> Options {
        Options {
            input: file.path().into(),
            output: None,
            workers: Some(workers),
            block_size,
            ordered: false,
            mapping: false,
        }
    }

    fn collecting_sink() -> (Arc<Mutex<Vec<HashResult>>>, ResultSink) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: ResultSink = {
            let seen = Arc::clone(&seen);
            Box::new(move |result| {
                seen.lock().unwrap().push(result);
                Ok(())
            })
        };
        (seen, sink)
    }

    fn sorted_digests(seen: &Arc<Mutex<Vec<HashResult>>>) -> Vec<(u64, String)> {
        let mut records: Vec<(u64, String)> =
            seen.lock().unwrap().iter().map(|r| (r.index, r.digest.clone())).collect();
        records.sort_unstable();
        records
    }

    fn write_file(data: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_sync_emits_short_tail_block() {
        // Five bytes in two-byte blocks: "he", "ll" and the short tail "o".
        let file = write_file(b"hello");
        let (seen, sink) = collecting_sink();

        run_sync(&options_for(&file, 2, 0), BlockHasher::new(Algorithm::Crc16), sink).unwrap();

        let expected = vec![
            (0, "EBEF".to_string()),
            (1, "2D2D".to_string()),
            (2, "2C40".to_string()),
        ];
        assert_eq!(sorted_digests(&seen), expected);
    }

    #[test]
    fn test_sync_digests_whole_file_as_one_block() {
        let file = write_file(b"123456789");
        let (seen, sink) = collecting_sink();

        run_sync(&options_for(&file, 9, 0), BlockHasher::new(Algorithm::Crc16), sink).unwrap();

        assert_eq!(sorted_digests(&seen), vec![(0, "BB3D".to_string())]);
    }

    #[test]
    fn test_streaming_matches_sync() {
        let data: Vec<u8> = (0..10_000u32).flat_map(|v| v.to_le_bytes()).collect();
        let file = write_file(&data);

        let (sync_seen, sync_sink) = collecting_sink();
        run_sync(&options_for(&file, 1000, 0), BlockHasher::new(Algorithm::Crc16), sync_sink).unwrap();

        let options = options_for(&file, 1000, 4);
        let plan = Plan::from_options(&options).unwrap();
        let (seen, sink) = collecting_sink();
        run_streaming(&options, &plan, BlockHasher::new(Algorithm::Crc16), sink).unwrap();

        assert_eq!(sorted_digests(&seen), sorted_digests(&sync_seen));
    }

    #[test]
    fn test_mapped_matches_sync() {
        let data: Vec<u8> = (0..10_000u32).flat_map(|v| v.to_be_bytes()).collect();
        let file = write_file(&data);

        let (sync_seen, sync_sink) = collecting_sink();
        run_sync(&options_for(&file, 512, 0), BlockHasher::new(Algorithm::Crc16), sync_sink).unwrap();

        let mut options = options_for(&file, 512, 4);
        options.mapping = true;
        let plan = Plan::from_options(&options).unwrap();
        let (seen, sink) = collecting_sink();
        run_mapped(&options, &plan, BlockHasher::new(Algorithm::Crc16), sink).unwrap();

        assert_eq!(sorted_digests(&seen), sorted_digests(&sync_seen));
    }

    #[test]
    fn test_sink_failure_aborts_streaming_run() {
        let file = write_file(&vec![0u8; 20 * 16]);
        let options = options_for(&file, 16, 2);
        let plan = Plan::from_options(&options).unwrap();

        let sink: ResultSink = Box::new(|result| {
            if result.index == 7 {
                bail!("injected failure on block 7");
            }
            Ok(())
        });

        let err =
            run_streaming(&options, &plan, BlockHasher::new(Algorithm::Crc16), sink).unwrap_err();

        assert!(err.to_string().contains("injected failure on block 7"));
    }
}
