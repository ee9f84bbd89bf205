//! Error types for the evolution engine.

use thiserror::Error;

/// Errors raised while evaluating a phenotype network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The input vector handed to [`Network::run`](crate::Network::run) does
    /// not match the network's declared input count.
    #[error("expected {expected} inputs, got {got}")]
    InputLength {
        /// Declared input count of the network.
        expected: usize,
        /// Length of the vector actually supplied.
        got: usize,
    },

    /// A neuron was re-entered while its own value was still being resolved.
    /// The topology contains a genuine cycle.
    #[error("cycle detected at neuron {0} during evaluation")]
    Cycle(u32),

    /// A link references a neuron the network does not contain. Genome
    /// invariants guarantee this never happens; seeing it means internal
    /// state is corrupt and the run must stop.
    #[error("link references unknown neuron {0}")]
    UnknownNeuron(u32),
}

/// Errors reported for a single organism's fitness evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The phenotype failed during a network run.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The external evaluator reported a failure.
    #[error("evaluator failed: {0}")]
    Failed(String),

    /// A worker died before reporting a result for this organism.
    #[error("evaluation worker lost")]
    WorkerLost,

    /// The run was cancelled while this evaluation was queued or in flight.
    #[error("evaluation cancelled")]
    Cancelled,
}

/// Errors from writing or restoring pool checkpoints.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("checkpoint i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The snapshot was produced by an incompatible crate version.
    #[error("unsupported snapshot version {0}")]
    Version(u32),
}

/// Fatal conditions that terminate the generation loop.
#[derive(Debug, Error)]
pub enum EvolveError {
    /// Every species was removed by culling or stagnation. The run is over.
    #[error("population went extinct at generation {0}")]
    Extinct(u64),

    /// Cancellation was requested before the generation's evaluations all
    /// completed. No generation-advancing state transition has occurred.
    #[error("run cancelled during generation {0}")]
    Cancelled(u64),

    /// An internal-consistency fault in a phenotype (see
    /// [`NetworkError::UnknownNeuron`]).
    #[error("structural fault: {0}")]
    Structural(NetworkError),
}
