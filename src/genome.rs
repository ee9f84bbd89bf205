//! Genome representation and the genetic operators.
//!
//! An [`Organism`] is an ordered list of [`Gene`]s plus the bookkeeping the
//! operators need: the cached innovation range (excess/disjoint
//! classification), the hidden-id watermark (collision-free link splits) and
//! the fitness assigned each generation.

use std::collections::{BTreeSet, HashMap, HashSet};

use rand::Rng;

use crate::config::EvolutionConfig;
use crate::gene::Gene;
use crate::innovation::InnovationRegistry;

/// One individual: a genome, its fitness, and the caches the genetic
/// operators maintain.
#[derive(Debug, Clone)]
pub struct Organism {
    /// Genes in insertion order. Alignment always goes through innovation
    /// lookups, never positions.
    pub genes: Vec<Gene>,
    /// Smallest innovation number in the genome (`u64::MAX` while empty).
    innovation_min: u64,
    /// Largest innovation number in the genome (0 while empty).
    innovation_max: u64,
    /// Highest hidden-neuron id allocated so far. Starts at the sensor-id
    /// ceiling so hidden ids never collide with the input layer.
    pub max_neuron: u32,
    /// Raw fitness, assigned once per generation.
    pub fitness: f32,
    /// Fitness after sharing within the species.
    pub adj_fitness: f32,
}

impl Organism {
    /// Empty genome for the given run topology.
    #[must_use]
    pub fn new(cfg: &EvolutionConfig) -> Self {
        Self {
            genes: Vec::new(),
            innovation_min: u64::MAX,
            innovation_max: 0,
            max_neuron: cfg.num_inputs,
            fitness: 0.0,
            adj_fitness: 0.0,
        }
    }

    /// Append a gene whose marking was already assigned, keeping the cached
    /// innovation range current.
    pub fn push_gene(&mut self, gene: Gene) {
        self.innovation_min = self.innovation_min.min(gene.innovation);
        self.innovation_max = self.innovation_max.max(gene.innovation);
        self.genes.push(gene);
    }

    /// Create a gene between two neuron ids, obtaining its historical
    /// marking from the registry.
    pub fn add_gene(
        &mut self,
        source: u32,
        target: u32,
        weight: f32,
        enabled: bool,
        registry: &InnovationRegistry,
    ) {
        let innovation = registry.marking(source, target);
        self.push_gene(Gene::new(innovation, source, target, weight, enabled));
    }

    /// Cached innovation range `(min, max)`, if any gene exists.
    #[must_use]
    pub fn innovation_range(&self) -> Option<(u64, u64)> {
        if self.genes.is_empty() {
            None
        } else {
            Some((self.innovation_min, self.innovation_max))
        }
    }

    /// Recombine two parents.
    ///
    /// The fitter parent is the primary one; ties resolve to `other`. Genes
    /// present only in the primary parent inherit unconditionally, genes
    /// present only in the other parent never inherit, and matching genes
    /// come from the less-fit parent with probability `p_keep_not_fit`. A
    /// gene disabled in either parent is disabled in the child with
    /// probability `p_disable`, otherwise enabled.
    #[must_use]
    pub fn crossover<R: Rng>(&self, other: &Self, cfg: &EvolutionConfig, rng: &mut R) -> Self {
        let (p1, p2) = if self.fitness > other.fitness {
            (self, other)
        } else {
            (other, self)
        };

        let p2_alleles: HashMap<u64, &Gene> =
            p2.genes.iter().map(|g| (g.innovation, g)).collect();

        let mut child = Self {
            genes: Vec::with_capacity(p1.genes.len()),
            innovation_min: u64::MAX,
            innovation_max: 0,
            max_neuron: p1.max_neuron,
            fitness: 0.0,
            adj_fitness: 0.0,
        };

        for gene in &p1.genes {
            let inherited = match p2_alleles.get(&gene.innovation) {
                Some(theirs) => {
                    let mut pick = if rng.random::<f32>() < cfg.p_keep_not_fit {
                        **theirs
                    } else {
                        *gene
                    };
                    let either_disabled = !gene.enabled || !theirs.enabled;
                    pick.enabled = !(either_disabled && rng.random::<f32>() < cfg.p_disable);
                    pick
                }
                None => *gene,
            };
            child.push_gene(inherited);
        }

        child
    }

    /// Compatibility distance to another genome.
    ///
    /// Genes outside the other genome's innovation range count as excess;
    /// genes inside it without a matching marking count as disjoint;
    /// matching genes accumulate absolute weight difference. The measure is
    /// directional over each genome's own range and is not symmetric.
    #[must_use]
    pub fn compatibility(&self, other: &Self, cfg: &EvolutionConfig) -> f32 {
        let mut excess = 0u32;
        let mut disjoint = 0u32;
        let mut matching = 0u32;
        let mut weight_diff = 0.0f32;

        let other_weights: HashMap<u64, f32> = other
            .genes
            .iter()
            .map(|g| (g.innovation, g.weight))
            .collect();
        let mut matched: HashSet<u64> = HashSet::new();

        for gene in &self.genes {
            if gene.innovation < other.innovation_min || gene.innovation > other.innovation_max {
                excess += 1;
            } else if let Some(&w) = other_weights.get(&gene.innovation) {
                weight_diff += (gene.weight - w).abs();
                matching += 1;
                matched.insert(gene.innovation);
            } else {
                disjoint += 1;
            }
        }

        for gene in &other.genes {
            if gene.innovation < self.innovation_min || gene.innovation > self.innovation_max {
                excess += 1;
            } else if !matched.contains(&gene.innovation) {
                disjoint += 1;
            }
        }

        let max_len = self.genes.len().max(other.genes.len());
        let n = if max_len > cfg.small_genome {
            max_len as f32
        } else {
            1.0
        };
        let weight_term = if matching > 0 {
            cfg.c_matching * weight_diff / matching as f32
        } else {
            0.0
        };

        cfg.c_excess * excess as f32 / n + cfg.c_disjoint * disjoint as f32 / n + weight_term
    }

    /// Whether this genome falls within the compatibility threshold of
    /// another.
    #[must_use]
    pub fn compatible(&self, other: &Self, cfg: &EvolutionConfig) -> bool {
        self.compatibility(other, cfg) < cfg.compat_threshold
    }

    /// Apply the three structural mutation triggers, each behind its own
    /// probability gate, in fixed order: weight perturbation, add-link,
    /// add-neuron.
    pub fn mutate<R: Rng>(
        &mut self,
        cfg: &EvolutionConfig,
        registry: &InnovationRegistry,
        rng: &mut R,
    ) {
        if rng.random::<f32>() < cfg.p_perturb {
            self.perturb_weights(cfg, rng);
        }
        if rng.random::<f32>() < cfg.p_link {
            self.add_random_link(cfg, registry, rng);
        }
        if rng.random::<f32>() < cfg.p_neuron {
            self.split_random_link(cfg, registry, rng);
        }
    }

    /// Per-gene coin flip: rescale the weight by `U(0,1)` or replace it with
    /// a fresh sample.
    fn perturb_weights<R: Rng>(&mut self, cfg: &EvolutionConfig, rng: &mut R) {
        for gene in &mut self.genes {
            if rng.random::<f32>() < cfg.p_perturb_uniform {
                gene.weight *= rng.random::<f32>();
            } else {
                gene.weight = cfg.weight_init.sample(rng);
            }
        }
    }

    /// Grow a new enabled gene between a random source and a random
    /// non-input target.
    pub fn add_random_link<R: Rng>(
        &mut self,
        cfg: &EvolutionConfig,
        registry: &InnovationRegistry,
        rng: &mut R,
    ) {
        let source = self.random_neuron(false, cfg, rng);
        let target = self.random_neuron(true, cfg, rng);
        let weight = cfg.weight_init.sample(rng);
        self.add_gene(source, target, weight, true, registry);
    }

    /// Split a random enabled gene: disable it, allocate the next hidden id,
    /// and bridge the gap with old-source -> new at the old weight and
    /// new -> old-target at 1.0 so the signal path keeps its multiplicative
    /// effect at the moment of the split.
    fn split_random_link<R: Rng>(
        &mut self,
        cfg: &EvolutionConfig,
        registry: &InnovationRegistry,
        rng: &mut R,
    ) {
        if self.max_neuron >= cfg.hidden_ceiling() {
            // Hidden-id budget exhausted; a further split would collide with
            // the reserved output offsets.
            return;
        }

        let enabled: Vec<usize> = self
            .genes
            .iter()
            .enumerate()
            .filter(|(_, g)| g.enabled)
            .map(|(i, _)| i)
            .collect();
        if enabled.is_empty() {
            return;
        }

        let idx = enabled[rng.random_range(0..enabled.len())];
        self.genes[idx].enabled = false;
        let (source, target, weight) = {
            let g = &self.genes[idx];
            (g.source, g.target, g.weight)
        };

        self.max_neuron += 1;
        let new_neuron = self.max_neuron;
        self.add_gene(source, new_neuron, weight, true, registry);
        self.add_gene(new_neuron, target, 1.0, true, registry);
    }

    /// Pick a uniformly random neuron id among the bias, sensors (unless
    /// excluded), outputs, and every neuron referenced by the genome.
    fn random_neuron<R: Rng>(
        &self,
        exclude_inputs: bool,
        cfg: &EvolutionConfig,
        rng: &mut R,
    ) -> u32 {
        let mut ids: BTreeSet<u32> = BTreeSet::new();

        if !exclude_inputs {
            for id in 0..=cfg.num_inputs {
                ids.insert(id);
            }
        }
        for o in 0..cfg.num_outputs {
            ids.insert(cfg.output_id(o));
        }
        for gene in &self.genes {
            if !(exclude_inputs && cfg.is_input(gene.source)) {
                ids.insert(gene.source);
            }
            if !(exclude_inputs && cfg.is_input(gene.target)) {
                ids.insert(gene.target);
            }
        }

        let ids: Vec<u32> = ids.into_iter().collect();
        ids[rng.random_range(0..ids.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightInit;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn test_cfg() -> EvolutionConfig {
        EvolutionConfig::new(3, 2, 10, 50)
    }

    #[test]
    fn test_push_gene_tracks_innovation_range() {
        let cfg = test_cfg();
        let reg = InnovationRegistry::new();
        let mut org = Organism::new(&cfg);
        assert!(org.innovation_range().is_none());

        org.add_gene(1, 14, 0.5, true, &reg);
        org.add_gene(2, 14, 0.5, true, &reg);
        org.add_gene(3, 15, 0.5, true, &reg);

        assert_eq!(org.innovation_range(), Some((1, 3)));
    }

    #[test]
    fn test_registry_determinism_across_genomes() {
        let cfg = test_cfg();
        let reg = InnovationRegistry::new();

        // Two genomes built from the same structural mutation sequence.
        let mut a = Organism::new(&cfg);
        let mut b = Organism::new(&cfg);
        for (s, t) in [(1, 14), (2, 14), (2, 15), (3, 15)] {
            a.add_gene(s, t, 0.1, true, &reg);
            b.add_gene(s, t, 0.9, true, &reg);
        }

        for (ga, gb) in a.genes.iter().zip(&b.genes) {
            assert_eq!(ga.innovation, gb.innovation);
        }
    }

    #[test]
    fn test_compatibility_to_self_is_zero() {
        let cfg = test_cfg();
        let reg = InnovationRegistry::new();
        let mut org = Organism::new(&cfg);
        org.add_gene(1, 14, 0.7, true, &reg);
        org.add_gene(2, 15, -0.3, true, &reg);

        assert!(org.compatibility(&org, &cfg).abs() < 1e-6);
    }

    #[test]
    fn test_compatibility_counts_excess_and_disjoint() {
        let mut cfg = test_cfg();
        cfg.c_excess = 1.0;
        cfg.c_disjoint = 1.0;
        cfg.c_matching = 0.0;
        let reg = InnovationRegistry::new();

        let mut a = Organism::new(&cfg);
        let mut b = Organism::new(&cfg);
        a.add_gene(1, 14, 0.5, true, &reg); // innovation 1, shared
        b.add_gene(1, 14, 0.5, true, &reg);
        a.add_gene(2, 14, 0.5, true, &reg); // innovation 2, only in a
        b.add_gene(3, 15, 0.5, true, &reg); // innovation 3, only in b

        // a's gene 2 lies inside b's range [1,3] without a match: disjoint.
        // b's gene 3 lies outside a's range [1,2]: excess.
        // Small-genome exemption keeps N at 1.
        let d = a.compatibility(&b, &cfg);
        assert!((d - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_crossover_child_never_larger_than_fitter_parent() {
        let cfg = test_cfg();
        let reg = InnovationRegistry::new();
        let mut rng = test_rng();

        let mut fit = Organism::new(&cfg);
        fit.add_gene(1, 14, 0.5, true, &reg);
        fit.add_gene(2, 14, 0.5, true, &reg);
        fit.fitness = 10.0;

        let mut weak = Organism::new(&cfg);
        weak.add_gene(1, 14, 0.9, true, &reg);
        weak.add_gene(3, 15, 0.9, true, &reg);
        weak.add_gene(2, 15, 0.9, true, &reg);
        weak.fitness = 1.0;

        for _ in 0..20 {
            let child = fit.crossover(&weak, &cfg, &mut rng);
            assert!(child.genes.len() <= fit.genes.len());
            // Genes only in the weaker parent never appear.
            assert!(child.genes.iter().all(|g| g.source != 3));
        }
    }

    #[test]
    fn test_crossover_matching_gene_allele_choice() {
        let mut cfg = test_cfg();
        let reg = InnovationRegistry::new();
        let mut rng = test_rng();

        let mut fit = Organism::new(&cfg);
        fit.add_gene(1, 14, 0.25, true, &reg);
        fit.fitness = 5.0;

        let mut weak = Organism::new(&cfg);
        weak.add_gene(1, 14, 0.75, true, &reg);
        weak.fitness = 1.0;

        cfg.p_keep_not_fit = 0.0;
        let child = fit.crossover(&weak, &cfg, &mut rng);
        assert!((child.genes[0].weight - 0.25).abs() < 1e-6);

        cfg.p_keep_not_fit = 1.0;
        let child = fit.crossover(&weak, &cfg, &mut rng);
        assert!((child.genes[0].weight - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_crossover_disable_inheritance() {
        let mut cfg = test_cfg();
        cfg.p_keep_not_fit = 0.0;
        let reg = InnovationRegistry::new();
        let mut rng = test_rng();

        let mut fit = Organism::new(&cfg);
        fit.add_gene(1, 14, 0.5, false, &reg);
        fit.fitness = 5.0;
        let mut weak = Organism::new(&cfg);
        weak.add_gene(1, 14, 0.5, true, &reg);
        weak.fitness = 1.0;

        // One parent carries the gene disabled: with p_disable = 1 the child
        // gene is always disabled, with p_disable = 0 always enabled.
        cfg.p_disable = 1.0;
        let child = fit.crossover(&weak, &cfg, &mut rng);
        assert!(!child.genes[0].enabled);

        cfg.p_disable = 0.0;
        let child = fit.crossover(&weak, &cfg, &mut rng);
        assert!(child.genes[0].enabled);
    }

    #[test]
    fn test_split_preserves_signal_path() {
        let mut cfg = test_cfg();
        cfg.p_perturb = 0.0;
        cfg.p_link = 0.0;
        cfg.p_neuron = 1.0;
        let reg = InnovationRegistry::new();
        let mut rng = test_rng();

        let mut org = Organism::new(&cfg);
        org.add_gene(1, 14, 5.0, true, &reg);

        org.mutate(&cfg, &reg, &mut rng);

        // Original gene still present but disabled; the split halves carry
        // the old weight and 1.0.
        assert_eq!(org.genes.len(), 3);
        assert!(!org.genes[0].enabled);
        assert!((org.genes[0].weight - 5.0).abs() < 1e-6);

        let new_neuron = org.max_neuron;
        assert_eq!(new_neuron, cfg.num_inputs + 1);
        assert_eq!(org.genes[1].source, 1);
        assert_eq!(org.genes[1].target, new_neuron);
        assert!((org.genes[1].weight - 5.0).abs() < 1e-6);
        assert_eq!(org.genes[2].source, new_neuron);
        assert_eq!(org.genes[2].target, 14);
        assert!((org.genes[2].weight - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_split_respects_hidden_budget() {
        let mut cfg = test_cfg();
        cfg.max_hidden = 1;
        cfg.p_perturb = 0.0;
        cfg.p_link = 0.0;
        cfg.p_neuron = 1.0;
        let reg = InnovationRegistry::new();
        let mut rng = test_rng();

        let mut org = Organism::new(&cfg);
        org.add_gene(1, cfg.output_id(0), 1.0, true, &reg);

        org.mutate(&cfg, &reg, &mut rng); // consumes the only hidden id
        let genes_after_first = org.genes.len();
        org.mutate(&cfg, &reg, &mut rng); // budget exhausted, no-op
        assert_eq!(org.genes.len(), genes_after_first);
        assert_eq!(org.max_neuron, cfg.hidden_ceiling());
    }

    #[test]
    fn test_add_link_targets_are_never_inputs() {
        let mut cfg = test_cfg();
        cfg.p_perturb = 0.0;
        cfg.p_link = 1.0;
        cfg.p_neuron = 0.0;
        let reg = InnovationRegistry::new();
        let mut rng = test_rng();

        let mut org = Organism::new(&cfg);
        for _ in 0..50 {
            org.mutate(&cfg, &reg, &mut rng);
        }
        for gene in &org.genes {
            assert!(!cfg.is_input(gene.target), "gene targets input {}", gene.target);
        }
    }

    #[test]
    fn test_perturb_rescale_shrinks_magnitude() {
        let mut cfg = test_cfg();
        cfg.p_perturb = 1.0;
        cfg.p_perturb_uniform = 1.0;
        cfg.p_link = 0.0;
        cfg.p_neuron = 0.0;
        let reg = InnovationRegistry::new();
        let mut rng = test_rng();

        let mut org = Organism::new(&cfg);
        org.add_gene(1, 14, 8.0, true, &reg);
        org.mutate(&cfg, &reg, &mut rng);

        // weight *= U(0,1) can only shrink an 8.0 weight.
        assert!(org.genes[0].weight.abs() <= 8.0);
    }

    #[test]
    fn test_perturb_replace_draws_from_init() {
        let mut cfg = test_cfg();
        cfg.p_perturb = 1.0;
        cfg.p_perturb_uniform = 0.0;
        cfg.p_link = 0.0;
        cfg.p_neuron = 0.0;
        cfg.weight_init = WeightInit::Constant(0.125);
        let reg = InnovationRegistry::new();
        let mut rng = test_rng();

        let mut org = Organism::new(&cfg);
        org.add_gene(1, 14, 8.0, true, &reg);
        org.mutate(&cfg, &reg, &mut rng);

        assert!((org.genes[0].weight - 0.125).abs() < 1e-6);
    }
}
