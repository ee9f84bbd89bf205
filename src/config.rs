//! Run configuration.
//!
//! The engine consumes a fully-resolved [`EvolutionConfig`] value; loading
//! and validating parameters from files or flags is the caller's concern.

use std::path::PathBuf;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::Activation;

/// Distribution new and replaced gene weights are drawn from.
///
/// Carried as data rather than a closure so configurations serialize into
/// checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightInit {
    /// Uniform over `[min, max]`.
    Uniform {
        /// Lower bound, inclusive.
        min: f32,
        /// Upper bound, inclusive.
        max: f32,
    },
    /// Every sample is the same value. Mostly useful in tests.
    Constant(f32),
}

impl WeightInit {
    /// Draw one weight.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f32 {
        match *self {
            Self::Uniform { min, max } => rng.random::<f32>() * (max - min) + min,
            Self::Constant(w) => w,
        }
    }
}

/// Checkpoint policy for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory snapshots are written into, one file per generation.
    pub dir: PathBuf,
    /// Write a snapshot every `interval` generations.
    pub interval: u64,
}

/// Fully-resolved parameters for one evolutionary run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of sensor neurons (excluding the bias neuron).
    pub num_inputs: u32,
    /// Number of output neurons.
    pub num_outputs: u32,
    /// Reserved hidden-neuron id budget; output ids sit above it.
    pub max_hidden: u32,
    /// Target population size, fixed for the run.
    pub population: usize,

    /// Compatibility coefficient for excess genes.
    pub c_excess: f32,
    /// Compatibility coefficient for disjoint genes.
    pub c_disjoint: f32,
    /// Compatibility coefficient for average matching-weight difference.
    pub c_matching: f32,
    /// Compatibility distance below which two genomes share a species.
    pub compat_threshold: f32,
    /// Genomes at or below this size skip gene-count normalization.
    pub small_genome: usize,
    /// Species at or below this size collapse to their best member when
    /// culled in top mode.
    pub small_species: usize,
    /// Generations without improvement before a species is removed.
    pub stagnation_limit: u32,
    /// Stagnation removal never drops the species count below this floor.
    pub min_species: usize,
    /// Fraction of a species that survives a non-top cull.
    pub cull_fraction: f32,

    /// Probability two parents cross over before mutation.
    pub p_crossover: f32,
    /// Probability a gene disabled in either parent stays disabled in the child.
    pub p_disable: f32,
    /// Probability a genome has its weights perturbed during mutation.
    pub p_perturb: f32,
    /// Per-gene chance a perturbed weight is rescaled instead of replaced.
    pub p_perturb_uniform: f32,
    /// Probability of adding a new link during mutation.
    pub p_link: f32,
    /// Probability of splitting a link into a new neuron during mutation.
    pub p_neuron: f32,
    /// Probability a matching gene is inherited from the less-fit parent.
    pub p_keep_not_fit: f32,

    /// Distribution for new and replaced weights.
    pub weight_init: WeightInit,
    /// Activation function applied by every neuron.
    pub activation: Activation,
    /// Checkpoint policy; `None` disables persistence.
    pub checkpoint: Option<CheckpointConfig>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            num_inputs: 2,
            num_outputs: 1,
            max_hidden: 64,
            population: 150,
            c_excess: 1.0,
            c_disjoint: 1.0,
            c_matching: 0.4,
            compat_threshold: 3.0,
            small_genome: 20,
            small_species: 5,
            stagnation_limit: 15,
            min_species: 2,
            cull_fraction: 0.5,
            p_crossover: 0.75,
            p_disable: 0.75,
            p_perturb: 0.8,
            p_perturb_uniform: 0.9,
            p_link: 0.3,
            p_neuron: 0.05,
            p_keep_not_fit: 0.5,
            weight_init: WeightInit::Uniform { min: -2.0, max: 2.0 },
            activation: Activation::Sigmoid,
            checkpoint: None,
        }
    }
}

impl EvolutionConfig {
    /// Config for a run with the given topology bounds and population.
    #[must_use]
    pub fn new(num_inputs: u32, num_outputs: u32, max_hidden: u32, population: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
            max_hidden,
            population,
            ..Self::default()
        }
    }

    /// Id of the bias neuron.
    #[inline]
    #[must_use]
    pub const fn bias_id(&self) -> u32 {
        0
    }

    /// Id of sensor `i` (zero-based).
    #[inline]
    #[must_use]
    pub const fn sensor_id(&self, i: u32) -> u32 {
        i + 1
    }

    /// Id of output `o` (zero-based). Output ids sit at a fixed offset above
    /// the reserved hidden range so hidden growth never collides with them.
    #[inline]
    #[must_use]
    pub const fn output_id(&self, o: u32) -> u32 {
        self.num_inputs + self.max_hidden + 1 + o
    }

    /// Whether `id` belongs to the input layer (bias or sensor).
    #[inline]
    #[must_use]
    pub const fn is_input(&self, id: u32) -> bool {
        id <= self.num_inputs
    }

    /// Whether `id` is an output neuron.
    #[inline]
    #[must_use]
    pub const fn is_output(&self, id: u32) -> bool {
        id > self.num_inputs + self.max_hidden
            && id <= self.num_inputs + self.max_hidden + self.num_outputs
    }

    /// Highest hidden id this run may allocate.
    #[inline]
    #[must_use]
    pub const fn hidden_ceiling(&self) -> u32 {
        self.num_inputs + self.max_hidden
    }
}
