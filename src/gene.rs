//! Genotype building blocks.
//!
//! A [`Gene`] is a genotype edge carrying a historical marking; neurons are
//! implicit in the id scheme until a phenotype is built (see
//! [`Network`](crate::Network)).

use serde::{Deserialize, Serialize};

/// The role of a neuron in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronKind {
    /// Always outputs 1.0; never recomputed.
    Bias,
    /// Receives one external input value.
    Sensor,
    /// Internal neuron added through link-split mutation.
    Hidden,
    /// Produces one network output.
    Output,
}

/// The layer a neuron occupies during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Placement {
    /// Input layer: value is supplied, never resolved.
    Input,
    /// Hidden layer.
    Hidden,
    /// Output layer.
    Output,
}

/// A genotype edge: one inheritable connection between two neuron ids.
///
/// The innovation number is assigned once by the
/// [`InnovationRegistry`](crate::InnovationRegistry) and never changes; it
/// is the sole alignment key for crossover and compatibility distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    /// Historical marking, globally unique per `(source, target)` pair.
    pub innovation: u64,
    /// Source neuron id.
    pub source: u32,
    /// Target neuron id.
    pub target: u32,
    /// Connection weight.
    pub weight: f32,
    /// Disabled genes are skipped at phenotype build but preserved for
    /// inheritance.
    pub enabled: bool,
}

impl Gene {
    /// Create a gene with a marking already obtained from the registry.
    #[must_use]
    pub fn new(innovation: u64, source: u32, target: u32, weight: f32, enabled: bool) -> Self {
        Self {
            innovation,
            source,
            target,
            weight,
            enabled,
        }
    }
}
