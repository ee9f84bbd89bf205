//! Activation functions applied by phenotype neurons.

use serde::{Deserialize, Serialize};

/// Activation function applied to a neuron's summed input.
///
/// The run's configuration picks one function for every neuron (see
/// [`EvolutionConfig::activation`](crate::EvolutionConfig)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Activation {
    /// Identity function: f(x) = x
    Identity,
    /// Sigmoid: f(x) = 1 / (1 + e^(-x))
    #[default]
    Sigmoid,
    /// Hyperbolic tangent: f(x) = tanh(x)
    Tanh,
    /// Rectified Linear Unit: f(x) = max(0, x)
    ReLU,
    /// Step function: f(x) = 1 if x > 0 else 0
    Step,
    /// Leaky ReLU: `f(x) = x` if `x > 0` else `0.01x`
    LeakyReLU,
}

impl Activation {
    /// All available activation functions.
    pub const ALL: [Self; 6] = [
        Self::Identity,
        Self::Sigmoid,
        Self::Tanh,
        Self::ReLU,
        Self::Step,
        Self::LeakyReLU,
    ];

    /// Apply this activation function to an input value.
    ///
    /// NaN propagates unchanged; infinities map to the function's limit so
    /// runaway weight sums stay finite where mathematically sensible.
    #[inline]
    #[must_use]
    pub fn apply(self, x: f32) -> f32 {
        if x.is_nan() {
            return f32::NAN;
        }

        match self {
            Self::Identity => x,
            Self::Sigmoid => {
                if x == f32::INFINITY {
                    return 1.0;
                }
                if x == f32::NEG_INFINITY {
                    return 0.0;
                }
                // sigmoid(-88) ~ 0 and sigmoid(88) ~ 1; clamp to avoid exp overflow
                let clamped = x.clamp(-88.0, 88.0);
                1.0 / (1.0 + (-clamped).exp())
            }
            Self::Tanh => {
                if x == f32::INFINITY {
                    return 1.0;
                }
                if x == f32::NEG_INFINITY {
                    return -1.0;
                }
                x.tanh()
            }
            Self::ReLU => {
                if x == f32::NEG_INFINITY {
                    return 0.0;
                }
                x.max(0.0)
            }
            Self::Step => {
                if x > 0.0 || x == f32::INFINITY {
                    1.0
                } else {
                    0.0
                }
            }
            Self::LeakyReLU => {
                if x > 0.0 {
                    x
                } else {
                    0.01 * x
                }
            }
        }
    }
}
