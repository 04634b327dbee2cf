//! Pluggable block digest.
//!
//! A [`BlockHasher`] absorbs the bytes of one block and renders the digest as
//! an uppercase hex string of the algorithm's natural width. Only CRC-16 is
//! currently provided, backed by the `crc` crate's catalogue.

use crc::{Crc, Digest, CRC_16_ARC};

// CRC-16/ARC, the classic CRC-16 (poly 0x8005, reflected, zero init).
static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Supported digest algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Crc16,
}

impl Algorithm {
    /// Width of the rendered digest in hex characters.
    #[inline]
    pub fn digest_width(self) -> usize {
        match self {
            Self::Crc16 => 4,
        }
    }
}

/// Streaming digest state for one worker.
///
/// `process_bytes` may be called any number of times before `finish`;
/// `finish` renders the digest and resets the state for the next block.
pub struct BlockHasher {
    algorithm: Algorithm,
    digest: Digest<'static, u16>,
}

impl BlockHasher {
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm, digest: CRC16.digest() }
    }

    /// Absorbs `bytes` into the running digest.
    #[inline]
    pub fn process_bytes(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// Renders the digest of everything absorbed since the last `finish`
    /// (or since construction) and resets the state.
    pub fn finish(&mut self) -> String {
        let digest = std::mem::replace(&mut self.digest, CRC16.digest());
        format!("{:0width$X}", digest.finalize(), width = self.algorithm.digest_width())
    }
}

impl Clone for BlockHasher {
    /// Yields an independent hasher of the same algorithm with fresh state.
    /// Workers clone the driver's hasher at pool construction, before any
    /// bytes have been absorbed.
    fn clone(&self) -> Self {
        Self::new(self.algorithm)
    }
}
