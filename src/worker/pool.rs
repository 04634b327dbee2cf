//! Piped worker pools: typed processing stages chained over shared channels.
//!
//! A [`WorkerPool`] runs N workers that drain a job channel, apply a worker
//! function and feed the results into an output channel. Pools compose into
//! pipelines by chaining: a downstream stage adopts the upstream stage's
//! output channel as its own input. A [`SinkPool`] is the terminal stage; it
//! has no results to forward, only a terminator channel whose closure tells
//! the producer that the pipeline is gone.
//!
//! Failure of any worker closes the channels around it, which ripples through
//! the pipeline: upstream workers see rejected pushes and exit, the producer
//! sees the terminator closed and stops feeding. The originating error is
//! re-raised by `wait` on the failed pool.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;

use crate::worker::channel::Channel;
use crate::worker::group::WorkerGroup;

/// A stage of N parallel workers mapping jobs of type `J` to results of type `R`.
pub struct WorkerPool<J, R> {
    group: WorkerGroup,
    input: Arc<Channel<J>>,
    output: Arc<Channel<R>>,
}

impl<J, R> WorkerPool<J, R>
where
    J: Send + 'static,
    R: Send + 'static,
{
    /// Source stage: fresh input and output channels of capacity `queue`.
    ///
    /// The worker function is cloned once per worker, so any state it carries
    /// (such as a hasher) is per-worker and never shared.
    pub fn new<W>(workers: usize, queue: usize, worker: W) -> Self
    where
        W: FnMut(J) -> Result<R> + Clone + Send + 'static,
    {
        let mut pool = Self {
            group: WorkerGroup::new(),
            input: Arc::new(Channel::new(queue)),
            output: Arc::new(Channel::new(queue)),
        };
        pool.run(workers, worker);
        pool
    }

    /// Chained stage: adopts `upstream`'s output channel as this stage's input.
    ///
    /// The type system enforces that the upstream result type matches this
    /// stage's job type. Both pools hold the shared channel; the upstream
    /// closes it when its workers finish, this pool drains it.
    pub fn chain<U, W>(workers: usize, queue: usize, upstream: &WorkerPool<U, J>, worker: W) -> Self
    where
        U: Send + 'static,
        W: FnMut(J) -> Result<R> + Clone + Send + 'static,
    {
        let mut pool = Self {
            group: WorkerGroup::new(),
            input: upstream.output(),
            output: Arc::new(Channel::new(queue)),
        };
        pool.run(workers, worker);
        pool
    }

    /// Handle to the input channel; the producer pushes jobs through it.
    pub fn input(&self) -> Arc<Channel<J>> {
        Arc::clone(&self.input)
    }

    /// Handle to the output channel, for chaining or observation.
    pub fn output(&self) -> Arc<Channel<R>> {
        Arc::clone(&self.output)
    }

    /// Awaits all workers, re-raising the first worker failure, then closes
    /// the output channel so the downstream stage can finish draining.
    pub fn wait(&mut self) -> Result<()> {
        let outcome = self.group.join();
        self.output.close();
        outcome
    }

    fn run<W>(&mut self, workers: usize, worker: W)
    where
        W: FnMut(J) -> Result<R> + Clone + Send + 'static,
    {
        for _ in 0..workers {
            let mut worker = worker.clone();
            let input = Arc::clone(&self.input);
            let output = Arc::clone(&self.output);
            self.group.launch(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| drain(&mut worker, &input, &output)));
                match outcome {
                    Ok(Ok(())) => Ok(()),
                    // Worker failure tears the pipeline down before surfacing.
                    Ok(Err(err)) => {
                        input.close();
                        output.close();
                        Err(err)
                    }
                    Err(payload) => {
                        input.close();
                        output.close();
                        panic::resume_unwind(payload)
                    }
                }
            });
        }
    }
}

impl<J, R> Drop for WorkerPool<J, R> {
    fn drop(&mut self) {
        // Guarantees no worker outlives the pool. Failures were either already
        // surfaced by wait() or are deliberately discarded on this path.
        self.input.close();
        self.output.close();
        self.group.wait();
    }
}

/// Single worker loop: pop, apply, push.
///
/// A `None` pop (input closed and drained) and a rejected push (downstream
/// closed) are both ordinary exits; only a worker function error is a failure.
/// A worker that finds its downstream closed also closes the stage's input,
/// so teardown ripples upstream instead of leaving a blocked feeder behind.
fn drain<J, R, W>(worker: &mut W, input: &Channel<J>, output: &Channel<R>) -> Result<()>
where
    W: FnMut(J) -> Result<R>,
{
    while let Some(job) = input.pop() {
        let result = worker(job)?;
        if output.push(result).is_err() {
            input.close();
            break;
        }
    }
    Ok(())
}

/// Terminal single-worker stage forwarding results into a caller-provided sink.
///
/// Instead of an output channel it owns a terminator: an empty channel whose
/// only purpose is to signal teardown. The producer polls
/// [`Channel::is_closed`] on it to abort early when the pipeline has failed.
pub struct SinkPool<J> {
    group: WorkerGroup,
    input: Arc<Channel<J>>,
    terminator: Arc<Channel<()>>,
}

impl<J> SinkPool<J>
where
    J: Send + 'static,
{
    /// Chains a sink stage onto `upstream`, consuming its results with `sink`.
    pub fn new<U, W>(queue: usize, upstream: &WorkerPool<U, J>, mut sink: W) -> Self
    where
        U: Send + 'static,
        W: FnMut(J) -> Result<()> + Send + 'static,
    {
        let mut pool = Self {
            group: WorkerGroup::new(),
            input: upstream.output(),
            terminator: Arc::new(Channel::new(queue)),
        };

        let input = Arc::clone(&pool.input);
        let terminator = Arc::clone(&pool.terminator);
        pool.group.launch(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| drain_into_sink(&mut sink, &input, &terminator)));
            match outcome {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => {
                    input.close();
                    terminator.close();
                    Err(err)
                }
                Err(payload) => {
                    input.close();
                    terminator.close();
                    panic::resume_unwind(payload)
                }
            }
        });

        pool
    }

    /// Handle to the terminator channel, the producer's early-abort probe.
    pub fn terminator(&self) -> Arc<Channel<()>> {
        Arc::clone(&self.terminator)
    }

    /// Awaits the sink worker, re-raising its failure, then closes the
    /// terminator.
    pub fn wait(&mut self) -> Result<()> {
        let outcome = self.group.join();
        self.terminator.close();
        outcome
    }
}

impl<J> Drop for SinkPool<J> {
    fn drop(&mut self) {
        self.input.close();
        self.terminator.close();
        self.group.wait();
    }
}

fn drain_into_sink<J, W>(sink: &mut W, input: &Channel<J>, terminator: &Channel<()>) -> Result<()>
where
    W: FnMut(J) -> Result<()>,
{
    while let Some(job) = input.pop() {
        sink(job)?;
        if terminator.is_closed() {
            input.close();
            break;
        }
    }
    Ok(())
}
