//! # Speciate
//!
//! A speciated NEAT-style neuroevolution engine: populations of
//! variable-topology neural networks evolve under fitness-proportional
//! allocation, with genomes clustered into reproductively-isolated species
//! by structural and weight similarity.
//!
//! ## Features
//!
//! - **Historical markings**: a lock-guarded [`InnovationRegistry`] gives
//!   every distinct structural mutation one global marking, so genes align
//!   across unrelated genomes during crossover and compatibility comparison
//! - **Speciation**: compatibility distance over excess, disjoint and
//!   matching genes clusters the population; stagnant species are retired,
//!   fitness sharing keeps any one cluster from taking over
//! - **Transient phenotypes**: networks are materialized from enabled genes
//!   immediately before evaluation and dropped right after, with links held
//!   in a `SlotMap` arena owned by the network
//! - **Concurrent evaluation**: a persistent bounded worker pool evaluates
//!   organisms in parallel behind a hard generation barrier that is failure-
//!   and cancellation-aware
//! - **Versioned checkpoints**: whole-population snapshots at generation
//!   boundaries, decoupled from the in-memory representation
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use speciate::{
//!     EvalCoordinator, EvalError, EvolutionConfig, FitnessEvaluator, Network, Pool,
//! };
//!
//! // Reward networks whose first output stays close to 0.5 for a probe input.
//! let evaluator: Arc<dyn FitnessEvaluator> =
//!     Arc::new(|net: &mut Network| -> Result<f32, EvalError> {
//!         let out = net.run(&[1.0, 0.0])?;
//!         Ok(1.0 - (out[0] - 0.5).abs())
//!     });
//!
//! let config = EvolutionConfig::new(2, 1, 16, 50);
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let mut pool = Pool::new(config, &mut rng);
//! let mut coordinator = EvalCoordinator::with_workers(evaluator, 2);
//!
//! for _ in 0..3 {
//!     let summary = pool.advance(&mut coordinator, &mut rng)?;
//!     println!(
//!         "gen {}: population {}, species {}, best {:.3}",
//!         summary.generation, summary.population, summary.species, summary.best_fitness
//!     );
//! }
//! # Ok::<(), speciate::EvolveError>(())
//! ```
//!
//! ## Architecture
//!
//! One generation moves through a fixed pipeline: every organism's
//! phenotype is built and evaluated (the coordinator's barrier guarantees
//! all fitnesses are in before anything else happens), species are trimmed
//! to their survival fraction, stagnant species retire, offspring are
//! allocated proportional to shared fitness against the fixed population
//! target, children are speciated, and the pool checkpoints.
//!
//! Genome mutation, crossover and speciation bookkeeping run on the
//! caller's thread. Only fitness evaluation is parallel, and the innovation
//! registry serializes its lookup-or-insert behind one lock, so structural
//! mutations observed anywhere in the population stay consistent.
//!
//! The evaluation contract is deliberately small: implement
//! [`FitnessEvaluator`] (or just use a closure) to drive a phenotype with
//! your own inputs and distill a scalar fitness. Evaluator failures are
//! contained to the organism they belong to.

pub mod activation;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod gene;
pub mod genome;
pub mod innovation;
pub mod network;
pub mod pool;
pub mod snapshot;
pub mod species;

// Re-exports for convenience
pub use activation::Activation;
pub use config::{CheckpointConfig, EvolutionConfig, WeightInit};
pub use error::{EvalError, EvolveError, NetworkError, SnapshotError};
pub use evaluate::{CancelHandle, EvalCoordinator, FitnessEvaluator, JobResult};
pub use gene::{Gene, NeuronKind, Placement};
pub use genome::Organism;
pub use innovation::InnovationRegistry;
pub use network::{Link, LinkId, Network, Neuron};
pub use pool::{GenerationSummary, Pool};
pub use snapshot::{
    read_checkpoint, write_checkpoint, PoolSnapshot, SNAPSHOT_VERSION,
};
pub use species::Species;
