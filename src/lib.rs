//! blocksum-rs - parallel block digests over a single file.
//!
//! Splits the input file into fixed-size blocks, hashes every block
//! independently and emits `<index>: <digest>` records, either as results
//! complete or sorted by block index. A pipeline of bounded channels and
//! worker pools keeps every core busy while capping peak memory; large files
//! can be read through a zero-copy memory mapping instead of per-block
//! buffers.

pub mod cli;
pub mod config;
pub mod error;
pub mod hasher;
pub mod processor;
pub mod sink;
pub mod sizing;
pub mod types;
pub mod worker;
