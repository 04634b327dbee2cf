//! Thread group with deferred failure collection.

use std::any::Any;
use std::thread::JoinHandle;

use anyhow::{anyhow, Result};

/// A set of launched worker threads and their completion outcomes.
///
/// Each launched task runs on its own OS thread and reports back either an
/// ordinary return, an error, or a panic. [`WorkerGroup::join`] surfaces the
/// first failure in launch order; [`WorkerGroup::wait`] discards failures and
/// is used on teardown paths where raising would mask an earlier error.
///
/// A group is not safe for concurrent mutation: one thread launches into it
/// and one thread joins or waits.
#[derive(Default)]
pub struct WorkerGroup {
    handles: Vec<JoinHandle<Result<()>>>,
}

impl WorkerGroup {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `task` on a fresh thread and records its handle.
    pub fn launch<F>(&mut self, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.handles.push(std::thread::spawn(task));
    }

    /// Awaits every launched task, discarding failures.
    pub fn wait(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }

    /// Awaits every launched task, then returns the first recorded failure.
    ///
    /// A panicked task is reported as an error carrying the panic message.
    /// All handles are consumed regardless of outcome.
    pub fn join(&mut self) -> Result<()> {
        let mut first_failure = None;
        for handle in self.handles.drain(..) {
            let outcome = handle
                .join()
                .unwrap_or_else(|panic| Err(anyhow!("worker thread panicked: {}", panic_message(&panic))));
            if let Err(err) = outcome {
                first_failure.get_or_insert(err);
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
