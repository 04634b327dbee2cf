//! Core type definitions and data structures.
//!
//! The units of work flowing through the pipeline:
//! - [`OwnedJob`] - a block read into its own buffer (streaming mode)
//! - [`MappedJob`] - a window into a shared memory-mapped region (mapped mode)
//! - [`HashResult`] - the digest of one block, tagged with its index
//!
//! These types are the common language between the mode drivers, the hasher
//! workers and the result sink.

use std::sync::Arc;

use memmap2::Mmap;

/// The digest of one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashResult {
    /// Zero-based ordinal of the block within the file.
    pub index: u64,

    /// Printable digest, uppercase hex zero-padded to the algorithm's width.
    pub digest: String,
}

/// A block of file data owned by the job itself.
///
/// Streaming mode allocates one buffer per block, so the number of jobs
/// buffered in the pipeline bounds the live memory.
pub struct OwnedJob {
    /// Zero-based ordinal of the block within the file.
    pub index: u64,

    /// The block's bytes; the final block of a file may be short.
    pub data: Vec<u8>,
}

/// A block of file data borrowed from a memory-mapped region.
///
/// The job holds the region alive through the `Arc`, so a worker can never
/// observe the mapping after it has been dropped, no matter how teardown
/// interleaves.
pub struct MappedJob {
    index: u64,
    region: Arc<Mmap>,
    offset: usize,
    len: usize,
}

impl MappedJob {
    #[inline]
    pub fn new(index: u64, region: Arc<Mmap>, offset: usize, len: usize) -> Self {
        Self { index, region, offset, len }
    }

    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The block's window into the mapped region.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.region[self.offset..self.offset + self.len]
    }
}
