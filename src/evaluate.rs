//! Fitness evaluation coordination.
//!
//! Evaluation is the one phase of a generation designed to run in parallel.
//! The [`EvalCoordinator`] owns a set of persistent worker threads fed
//! through a channel; each worker holds at most one in-flight evaluation
//! (evaluators may be stateful or expensive) and is reused for the whole
//! run. [`EvalCoordinator::evaluate_batch`] is the generation barrier: it
//! returns only once every submitted organism has a result, successful or
//! not, so a failed evaluation can never hang the generation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use crate::error::EvalError;
use crate::network::Network;

/// An externally-supplied fitness function.
///
/// The coordinator hands each implementation a freshly-built phenotype; the
/// evaluator drives it with its own inputs and distills a single scalar
/// fitness. Implementations must be shareable across worker threads.
pub trait FitnessEvaluator: Send + Sync {
    /// Produce a fitness for one phenotype.
    ///
    /// # Errors
    ///
    /// Any [`EvalError`]; the generation loop recovers by assigning the
    /// organism fitness 0.
    fn evaluate(&self, network: &mut Network) -> Result<f32, EvalError>;
}

impl<F> FitnessEvaluator for F
where
    F: Fn(&mut Network) -> Result<f32, EvalError> + Send + Sync,
{
    fn evaluate(&self, network: &mut Network) -> Result<f32, EvalError> {
        self(network)
    }
}

struct Job {
    id: usize,
    network: Network,
}

/// Outcome for one submitted organism.
pub type JobResult = (usize, Result<f32, EvalError>);

/// Shared flag that asks the coordinator to stop.
///
/// Cancellation abandons queued and in-flight evaluations; the pool never
/// advances a generation from a partially-evaluated population.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Dispatches phenotype evaluations to a bounded worker set and joins them
/// back into a complete per-generation result set.
pub struct EvalCoordinator {
    job_tx: Option<Sender<Job>>,
    result_rx: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
}

impl EvalCoordinator {
    /// Coordinator sized to the host's available parallelism.
    #[must_use]
    pub fn new(evaluator: Arc<dyn FitnessEvaluator>) -> Self {
        let workers = thread::available_parallelism().map_or(1, usize::from);
        Self::with_workers(evaluator, workers)
    }

    /// Coordinator with an explicit worker count (at least one).
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to spawn a worker thread.
    #[must_use]
    pub fn with_workers(evaluator: Arc<dyn FitnessEvaluator>, workers: usize) -> Self {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (result_tx, result_rx) = unbounded::<JobResult>();
        let cancel = Arc::new(AtomicBool::new(false));

        let workers = (0..workers.max(1))
            .map(|i| {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let evaluator = Arc::clone(&evaluator);
                let cancel = Arc::clone(&cancel);
                thread::Builder::new()
                    .name(format!("eval-worker-{i}"))
                    .spawn(move || worker_loop(&job_rx, &result_tx, &*evaluator, &cancel))
                    .expect("failed to spawn evaluation worker")
            })
            .collect();

        // The workers hold the only result senders; when they all exit the
        // result channel disconnects instead of blocking the barrier.
        drop(result_tx);

        Self {
            job_tx: Some(job_tx),
            result_rx,
            workers,
            cancel,
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Handle for requesting cancellation from another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }

    /// Evaluate a batch of phenotypes and wait for every result.
    ///
    /// Returns one entry per submitted job, in completion order. Organisms
    /// whose worker died before reporting come back as
    /// [`EvalError::WorkerLost`].
    ///
    /// # Errors
    ///
    /// [`EvalError::Cancelled`] if cancellation was requested before the
    /// whole batch completed; partial results are discarded.
    pub fn evaluate_batch(
        &mut self,
        jobs: Vec<(usize, Network)>,
    ) -> Result<Vec<JobResult>, EvalError> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(EvalError::Cancelled);
        }

        let ids: Vec<usize> = jobs.iter().map(|(id, _)| *id).collect();
        if let Some(tx) = &self.job_tx {
            for (id, network) in jobs {
                if tx.send(Job { id, network }).is_err() {
                    break;
                }
            }
        }

        let mut results = Vec::with_capacity(ids.len());
        for _ in 0..ids.len() {
            match self.result_rx.recv() {
                Ok(result) => results.push(result),
                // Every worker exited; the rest of the batch is lost.
                Err(_) => break,
            }
        }

        if results.len() < ids.len() {
            let received: std::collections::HashSet<usize> =
                results.iter().map(|(id, _)| *id).collect();
            for id in ids {
                if !received.contains(&id) {
                    results.push((id, Err(EvalError::WorkerLost)));
                }
            }
        }

        if self.cancel.load(Ordering::SeqCst) {
            return Err(EvalError::Cancelled);
        }
        Ok(results)
    }
}

impl Drop for EvalCoordinator {
    fn drop(&mut self) {
        // Closing the job channel ends every worker loop.
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    job_rx: &Receiver<Job>,
    result_tx: &Sender<JobResult>,
    evaluator: &dyn FitnessEvaluator,
    cancel: &AtomicBool,
) {
    for mut job in job_rx.iter() {
        let result = if cancel.load(Ordering::SeqCst) {
            Err(EvalError::Cancelled)
        } else {
            // A panicking evaluator must not take the barrier down with it.
            catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(&mut job.network)))
                .unwrap_or_else(|_| Err(EvalError::Failed("evaluator panicked".into())))
        };
        if result_tx.send((job.id, result)).is_err() {
            debug!("result channel closed, evaluation worker exiting");
            break;
        }
    }
}
