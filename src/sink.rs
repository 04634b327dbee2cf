//! Result sinks: where finished digests go.
//!
//! Two canonical sinks exist. The unordered sink writes each record to the
//! output stream the moment it completes. The ordered sink accumulates
//! records in a map keyed by block index and is flushed by the driver once
//! the pipeline has drained; it refuses to grow beyond
//! [`RESULT_LIMIT`](crate::config::RESULT_LIMIT) entries.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{ensure, Context, Result};

use crate::config::RESULT_LIMIT;
use crate::types::HashResult;

/// Shared handle to the output stream.
///
/// Cloned between the driver and the sink worker. The mutex is uncontended
/// while the pipeline is alive: only the single sink worker writes, and the
/// driver touches the stream again only after the pipeline has drained.
#[derive(Clone)]
pub struct ResultWriter {
    stream: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl ResultWriter {
    pub fn new(stream: Box<dyn Write + Send>) -> Self {
        Self { stream: Arc::new(Mutex::new(stream)) }
    }

    /// Writes one `<index>: <digest>` record.
    pub fn write_record(&self, index: u64, digest: &str) -> Result<()> {
        writeln!(self.lock(), "{index}: {digest}").context("failed to write results")
    }

    pub fn flush(&self) -> Result<()> {
        self.lock().flush().context("failed to write results")
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Accumulator behind ordered output.
#[derive(Default)]
pub struct OrderedResults {
    results: BTreeMap<u64, String>,
}

impl OrderedResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores one result, refusing to grow beyond the result limit.
    pub fn insert(&mut self, result: HashResult) -> Result<()> {
        ensure!(self.results.len() < RESULT_LIMIT, "too many results (try unordered output)");
        self.results.insert(result.index, result.digest);
        Ok(())
    }

    /// Writes every record in block order.
    pub fn write_to(&self, writer: &ResultWriter) -> Result<()> {
        for (index, digest) in &self.results {
            writer.write_record(*index, digest)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// The callback a run feeds with results, either from the terminal pipeline
/// stage or inline in synchronous mode.
pub type ResultSink = Box<dyn FnMut(HashResult) -> Result<()> + Send>;

/// Sink writing records as they complete, in completion order.
pub fn unordered_sink(writer: &ResultWriter) -> ResultSink {
    let writer = writer.clone();
    Box::new(move |result| writer.write_record(result.index, &result.digest))
}

/// Sink accumulating records into the shared ordered collector.
pub fn ordered_sink(collector: &Arc<Mutex<OrderedResults>>) -> ResultSink {
    let collector = Arc::clone(collector);
    Box::new(move |result| collector.lock().unwrap_or_else(PoisonError::into_inner).insert(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A writer whose buffer stays inspectable after the sink consumed it.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe gone"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn result(index: u64, digest: &str) -> HashResult {
        HashResult { index, digest: digest.to_string() }
    }

    #[test]
    fn test_unordered_sink_writes_through() {
        let buffer = SharedBuffer::default();
        let writer = ResultWriter::new(Box::new(buffer.clone()));
        let mut sink = unordered_sink(&writer);

        sink(result(1, "4EA1")).unwrap();
        sink(result(0, "2672")).unwrap();

        assert_eq!(buffer.contents(), "1: 4EA1\n0: 2672\n");
    }

    #[test]
    fn test_unordered_sink_fails_on_write_error() {
        let writer = ResultWriter::new(Box::new(FailingWriter));
        let mut sink = unordered_sink(&writer);

        let err = sink(result(0, "2672")).unwrap_err();
        assert!(err.to_string().contains("failed to write results"));
    }

    #[test]
    fn test_ordered_results_start_empty() {
        let mut results = OrderedResults::new();
        assert!(results.is_empty());

        results.insert(result(0, "2672")).unwrap();

        assert!(!results.is_empty());
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_ordered_results_flush_in_block_order() {
        let mut results = OrderedResults::new();
        results.insert(result(2, "9751")).unwrap();
        results.insert(result(0, "2672")).unwrap();
        results.insert(result(1, "4EA1")).unwrap();

        let buffer = SharedBuffer::default();
        let writer = ResultWriter::new(Box::new(buffer.clone()));
        results.write_to(&writer).unwrap();

        assert_eq!(buffer.contents(), "0: 2672\n1: 4EA1\n2: 9751\n");
    }

    #[test]
    fn test_ordered_results_enforce_limit() {
        let mut results = OrderedResults::new();
        for index in 0..RESULT_LIMIT as u64 {
            results.insert(result(index, "0000")).unwrap();
        }

        let err = results.insert(result(RESULT_LIMIT as u64, "0000")).unwrap_err();

        assert_eq!(err.to_string(), "too many results (try unordered output)");
        assert_eq!(results.len(), RESULT_LIMIT);
    }

    #[test]
    fn test_ordered_sink_reaches_shared_collector() {
        let collector = Arc::new(Mutex::new(OrderedResults::new()));
        let mut sink = ordered_sink(&collector);

        sink(result(7, "ABCD")).unwrap();

        assert_eq!(collector.lock().unwrap().len(), 1);
    }
}
