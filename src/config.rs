//! Global configuration constants.
//!
//! Process-wide policy, not user configuration: these limits shape the sizing
//! policy and the ordered result sink for every run.

/// Maximum number of results the ordered sink will accumulate.
///
/// Ordered output has to hold every result in memory until the run finishes.
/// Processing a 10 GB file with 2-byte blocks would produce several million
/// results, so the ordered sink refuses runs beyond this cap instead of
/// silently eating RAM. Unordered output has no such limit.
pub const RESULT_LIMIT: usize = 100_000;

/// Upper bound on the job queue capacity.
///
/// The optimal number of parallel computations is the hardware thread count;
/// a queue much deeper than that only keeps workers from waiting on the
/// producer. This cap keeps the queue from growing into a memory sink.
pub const QUEUE_LIMIT: usize = 1_000;

/// Policy ceiling on cumulative buffered-block memory in streaming mode.
///
/// The sizing policy shrinks the queue so that all blocks waiting to be
/// processed fit under this limit. Blocks too large for even a single-slot
/// queue force synchronous processing. Mapped mode ignores the limit, since
/// buffered jobs there carry no heap.
pub const SOFT_MEMORY_LIMIT: usize = 1024 * 1024 * 1024;

/// Refill buffer size for synchronous processing.
pub const SYNC_BUFFER_SIZE: usize = 1024 * 1024 * 10;
