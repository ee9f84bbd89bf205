//! Transient phenotype construction and evaluation.
//!
//! A [`Network`] is materialized from a genome's enabled genes immediately
//! before evaluation and discarded as soon as a fitness is known; it is
//! never serialized or carried across generations. Links live in a
//! [`SlotMap`] arena owned by the network, with neurons holding incoming
//! back-references into it, so link weights can never drift from the genes
//! they were copied from.

use std::collections::HashMap;

use slotmap::{new_key_type, SlotMap};

use crate::activation::Activation;
use crate::config::EvolutionConfig;
use crate::error::NetworkError;
use crate::gene::{NeuronKind, Placement};
use crate::genome::Organism;

new_key_type! {
    /// Key of a phenotype link in the network's arena.
    pub struct LinkId;
}

/// A phenotype edge: weight copied from the originating gene at build time.
#[derive(Debug, Clone, Copy)]
pub struct Link {
    /// Source neuron id.
    pub source: u32,
    /// Target neuron id.
    pub target: u32,
    /// Weight at the moment the phenotype was built.
    pub weight: f32,
}

/// A phenotype neuron.
#[derive(Debug, Clone)]
pub struct Neuron {
    /// Role of the neuron.
    pub kind: NeuronKind,
    /// Layer the neuron occupies.
    pub place: Placement,
    /// Last computed (or supplied) value.
    pub value: f32,
    /// Frame stamp of the last computation; memoizes evaluation within one
    /// network run.
    frame: u64,
    /// Incoming links, as back-references into the network's arena.
    incoming: Vec<LinkId>,
}

impl Neuron {
    fn new(kind: NeuronKind, place: Placement) -> Self {
        Self {
            kind,
            place,
            value: 0.0,
            frame: 0,
            incoming: Vec::new(),
        }
    }
}

/// A directed graph of neurons and links built from one genome.
#[derive(Debug, Clone)]
pub struct Network {
    neurons: HashMap<u32, Neuron>,
    links: SlotMap<LinkId, Link>,
    frame: u64,
    num_inputs: u32,
    num_outputs: u32,
    output_base: u32,
    activation: Activation,
}

impl Network {
    /// Skeleton network: bias, sensors, and outputs at their reserved ids.
    #[must_use]
    pub fn new(cfg: &EvolutionConfig) -> Self {
        let mut neurons = HashMap::new();

        let mut bias = Neuron::new(NeuronKind::Bias, Placement::Input);
        bias.value = 1.0;
        neurons.insert(cfg.bias_id(), bias);

        for i in 0..cfg.num_inputs {
            neurons.insert(
                cfg.sensor_id(i),
                Neuron::new(NeuronKind::Sensor, Placement::Input),
            );
        }
        for o in 0..cfg.num_outputs {
            neurons.insert(
                cfg.output_id(o),
                Neuron::new(NeuronKind::Output, Placement::Output),
            );
        }

        Self {
            neurons,
            links: SlotMap::with_key(),
            frame: 0,
            num_inputs: cfg.num_inputs,
            num_outputs: cfg.num_outputs,
            output_base: cfg.output_id(0),
            activation: cfg.activation,
        }
    }

    /// Materialize the phenotype for a genome: one link per enabled gene,
    /// hidden neurons created on demand.
    #[must_use]
    pub fn from_organism(organism: &Organism, cfg: &EvolutionConfig) -> Self {
        let mut network = Self::new(cfg);
        for gene in &organism.genes {
            if gene.enabled {
                network.push_link(gene.source, gene.target, gene.weight);
            }
        }
        network
    }

    /// Insert a link, creating hidden endpoint neurons as needed.
    pub fn push_link(&mut self, source: u32, target: u32, weight: f32) {
        self.neurons
            .entry(source)
            .or_insert_with(|| Neuron::new(NeuronKind::Hidden, Placement::Hidden));
        let link = self.links.insert(Link {
            source,
            target,
            weight,
        });
        self.neurons
            .entry(target)
            .or_insert_with(|| Neuron::new(NeuronKind::Hidden, Placement::Hidden))
            .incoming
            .push(link);
    }

    /// Whether at least one output neuron has an incoming link. A network
    /// failing this is structurally useless: its fitness is 0 by definition
    /// and the evaluator is never invoked.
    #[must_use]
    pub fn outputs_connected(&self) -> bool {
        (0..self.num_outputs).any(|o| {
            self.neurons
                .get(&(self.output_base + o))
                .is_some_and(|n| !n.incoming.is_empty())
        })
    }

    /// Number of input values [`run`](Self::run) expects.
    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs as usize
    }

    /// Number of output values [`run`](Self::run) produces.
    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.num_outputs as usize
    }

    /// Evaluate the network for one input vector.
    ///
    /// Each output resolves recursively through its incoming links; a frame
    /// stamp memoizes every neuron's value within the run. Re-entering a
    /// neuron whose value is still being resolved means the topology holds a
    /// genuine cycle and evaluation reports [`NetworkError::Cycle`] instead
    /// of recursing without bound.
    ///
    /// # Errors
    ///
    /// [`NetworkError::InputLength`] when `inputs` does not match the
    /// declared input count; [`NetworkError::Cycle`] on cyclic topologies;
    /// [`NetworkError::UnknownNeuron`] if a link references a missing neuron
    /// (an internal-consistency fault).
    pub fn run(&mut self, inputs: &[f32]) -> Result<Vec<f32>, NetworkError> {
        if inputs.len() != self.num_inputs as usize {
            return Err(NetworkError::InputLength {
                expected: self.num_inputs as usize,
                got: inputs.len(),
            });
        }

        self.frame += 1;

        for (i, &value) in inputs.iter().enumerate() {
            if let Some(neuron) = self.neurons.get_mut(&(i as u32 + 1)) {
                neuron.value = value;
            }
        }

        let mut in_flight = Vec::new();
        let mut outputs = Vec::with_capacity(self.num_outputs as usize);
        for o in 0..self.num_outputs {
            outputs.push(self.resolve(self.output_base + o, &mut in_flight)?);
        }
        Ok(outputs)
    }

    /// Compute one neuron's value for the current frame.
    fn resolve(&mut self, id: u32, in_flight: &mut Vec<u32>) -> Result<f32, NetworkError> {
        let (place, frame, value) = {
            let neuron = self
                .neurons
                .get(&id)
                .ok_or(NetworkError::UnknownNeuron(id))?;
            (neuron.place, neuron.frame, neuron.value)
        };

        if place == Placement::Input {
            return Ok(value);
        }
        if frame == self.frame {
            return Ok(value);
        }
        if in_flight.contains(&id) {
            return Err(NetworkError::Cycle(id));
        }
        in_flight.push(id);

        let incoming = self.neurons[&id].incoming.clone();
        let mut sum = 0.0;
        for link_id in incoming {
            let (source, weight) = {
                let link = &self.links[link_id];
                (link.source, link.weight)
            };
            sum += weight * self.resolve(source, in_flight)?;
        }
        in_flight.pop();

        let activated = self.activation.apply(sum);
        let neuron = self
            .neurons
            .get_mut(&id)
            .ok_or(NetworkError::UnknownNeuron(id))?;
        neuron.value = activated;
        neuron.frame = self.frame;
        Ok(activated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::innovation::InnovationRegistry;

    fn identity_cfg(num_inputs: u32, num_outputs: u32, max_hidden: u32) -> EvolutionConfig {
        let mut cfg = EvolutionConfig::new(num_inputs, num_outputs, max_hidden, 10);
        cfg.activation = Activation::Identity;
        cfg
    }

    #[test]
    fn test_skeleton_has_reserved_layout() {
        let cfg = identity_cfg(3, 2, 4);
        let net = Network::new(&cfg);

        assert_eq!(net.num_inputs(), 3);
        assert_eq!(net.num_outputs(), 2);
        assert!(!net.outputs_connected());
    }

    #[test]
    fn test_fully_connected_identity_sums_inputs() {
        // 3 inputs, 2 outputs, no hidden budget, one enabled gene per
        // (input, output) pair with weight 1.
        let cfg = identity_cfg(3, 2, 0);
        let reg = InnovationRegistry::new();
        let mut org = Organism::new(&cfg);
        for i in 0..3 {
            for o in 0..2 {
                org.add_gene(cfg.sensor_id(i), cfg.output_id(o), 1.0, true, &reg);
            }
        }

        let mut net = Network::from_organism(&org, &cfg);
        let out = net.run(&[1.0, 2.0, 3.0]).expect("run");
        assert_eq!(out.len(), 2);
        assert!((out[0] - 6.0).abs() < 1e-6);
        assert!((out[1] - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_weights_yield_activation_of_zero() {
        let mut cfg = EvolutionConfig::new(2, 2, 0, 10);
        cfg.activation = Activation::Sigmoid;
        let reg = InnovationRegistry::new();
        let mut org = Organism::new(&cfg);
        for i in 0..2 {
            for o in 0..2 {
                org.add_gene(cfg.sensor_id(i), cfg.output_id(o), 0.0, true, &reg);
            }
        }

        let mut net = Network::from_organism(&org, &cfg);
        let expected = Activation::Sigmoid.apply(0.0);
        for inputs in [[0.0, 0.0], [5.0, -3.0], [100.0, 100.0]] {
            let out = net.run(&inputs).expect("run");
            for value in out {
                assert!((value - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_bias_contributes_fixed_one() {
        let cfg = identity_cfg(1, 1, 0);
        let reg = InnovationRegistry::new();
        let mut org = Organism::new(&cfg);
        org.add_gene(cfg.bias_id(), cfg.output_id(0), 0.5, true, &reg);

        let mut net = Network::from_organism(&org, &cfg);
        let out = net.run(&[99.0]).expect("run");
        assert!((out[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_disabled_genes_are_not_materialized() {
        let cfg = identity_cfg(1, 1, 0);
        let reg = InnovationRegistry::new();
        let mut org = Organism::new(&cfg);
        org.add_gene(cfg.sensor_id(0), cfg.output_id(0), 1.0, false, &reg);

        let net = Network::from_organism(&org, &cfg);
        assert!(!net.outputs_connected());
    }

    #[test]
    fn test_hidden_chain_resolves_through_split() {
        let cfg = identity_cfg(1, 1, 4);
        let reg = InnovationRegistry::new();
        let mut org = Organism::new(&cfg);
        let hidden = cfg.num_inputs + 1;
        org.add_gene(cfg.sensor_id(0), hidden, 5.0, true, &reg);
        org.add_gene(hidden, cfg.output_id(0), 1.0, true, &reg);

        let mut net = Network::from_organism(&org, &cfg);
        let out = net.run(&[2.0]).expect("run");
        assert!((out[0] - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_input_length_mismatch_is_reported() {
        let cfg = identity_cfg(2, 1, 0);
        let mut net = Network::new(&cfg);
        let err = net.run(&[1.0]).unwrap_err();
        assert_eq!(
            err,
            NetworkError::InputLength {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn test_cycle_is_reported_not_divergent() {
        let cfg = identity_cfg(1, 1, 4);
        let mut net = Network::new(&cfg);
        let a = cfg.num_inputs + 1;
        let b = cfg.num_inputs + 2;
        net.push_link(a, b, 1.0);
        net.push_link(b, a, 1.0);
        net.push_link(b, cfg.output_id(0), 1.0);

        let err = net.run(&[1.0]).unwrap_err();
        assert!(matches!(err, NetworkError::Cycle(_)));
    }

    #[test]
    fn test_memoization_shares_hidden_value_across_outputs() {
        let cfg = identity_cfg(1, 2, 4);
        let mut net = Network::new(&cfg);
        let hidden = cfg.num_inputs + 1;
        net.push_link(cfg.sensor_id(0), hidden, 3.0);
        net.push_link(hidden, cfg.output_id(0), 1.0);
        net.push_link(hidden, cfg.output_id(1), 2.0);

        let out = net.run(&[1.0]).expect("run");
        assert!((out[0] - 3.0).abs() < 1e-6);
        assert!((out[1] - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_consecutive_runs_use_fresh_frames() {
        let cfg = identity_cfg(1, 1, 0);
        let mut net = Network::new(&cfg);
        net.push_link(cfg.sensor_id(0), cfg.output_id(0), 2.0);

        let first = net.run(&[1.0]).expect("run");
        let second = net.run(&[4.0]).expect("run");
        assert!((first[0] - 2.0).abs() < 1e-6);
        assert!((second[0] - 8.0).abs() < 1e-6);
    }
}
