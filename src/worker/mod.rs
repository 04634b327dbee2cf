//! The parallel pipeline building blocks.
//!
//! Three layers, composed bottom-up:
//! - [`channel::Channel`] - bounded closeable FIFO, the only inter-stage transport
//! - [`group::WorkerGroup`] - spawns threads and collects their outcomes
//! - [`pool::WorkerPool`] / [`pool::SinkPool`] - typed stages chained into a pipeline

pub mod channel;
pub mod group;
pub mod pool;

pub use channel::Channel;
pub use group::WorkerGroup;
pub use pool::{SinkPool, WorkerPool};
