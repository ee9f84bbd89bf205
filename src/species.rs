//! Species: clusters of mutually-compatible genomes.
//!
//! A species owns culling and reproduction within its cluster and tracks
//! how long it has gone without improving. It has no stable identity of its
//! own: membership is decided against whatever organism currently sits
//! first in the member list.

use rand::Rng;

use crate::config::EvolutionConfig;
use crate::genome::Organism;
use crate::innovation::InnovationRegistry;

/// A cluster of reproductively-isolated genomes.
#[derive(Debug, Clone)]
pub struct Species {
    /// Member organisms; descending fitness order once sorted.
    pub members: Vec<Organism>,
    /// Whether the member list is currently sorted by fitness.
    sorted: bool,
    /// Generations since the species last improved its best fitness.
    pub stagnation: u32,
    /// Best fitness the species has ever seen.
    pub best_fitness: f32,
}

impl Species {
    /// New species seeded with its first member.
    #[must_use]
    pub fn new(representative: Organism) -> Self {
        Self {
            members: vec![representative],
            sorted: false,
            stagnation: 0,
            best_fitness: f32::NEG_INFINITY,
        }
    }

    /// Whether a candidate belongs to this species, judged against the
    /// current first member only.
    #[must_use]
    pub fn compatible(&self, candidate: &Organism, cfg: &EvolutionConfig) -> bool {
        self.members
            .first()
            .is_some_and(|rep| rep.compatible(candidate, cfg))
    }

    /// Append a member, invalidating the cached sort order.
    pub fn add_member(&mut self, member: Organism) {
        self.members.push(member);
        self.sorted = false;
    }

    /// Invalidate the cached sort order after fitness values changed.
    pub(crate) fn mark_unsorted(&mut self) {
        self.sorted = false;
    }

    /// Stable sort, descending by fitness, memoized until membership or
    /// fitness changes.
    pub fn sort_by_fitness(&mut self) {
        if !self.sorted {
            self.members
                .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
            self.sorted = true;
        }
    }

    /// Trim the species; returns the number of members removed.
    ///
    /// Non-top mode removes the weakest members until the survival fraction
    /// is reached, but never below one member. Top mode updates the
    /// stagnation bookkeeping and, for species at or below the small-species
    /// threshold, collapses the cluster to its best member.
    pub fn cull(&mut self, all_but_top: bool, cfg: &EvolutionConfig) -> usize {
        if self.members.is_empty() {
            return 0;
        }
        self.sort_by_fitness();

        if all_but_top {
            let best = self.members[0].fitness;
            if best > self.best_fitness {
                self.best_fitness = best;
                self.stagnation = 0;
            } else {
                self.stagnation += 1;
            }

            if self.members.len() <= cfg.small_species {
                let removed = self.members.len() - 1;
                self.members.truncate(1);
                removed
            } else {
                0
            }
        } else {
            let original = self.members.len();
            while self.members.len() as f32 > cfg.cull_fraction * original as f32
                && self.members.len() > 1
            {
                self.members.pop();
            }
            original - self.members.len()
        }
    }

    /// Produce one child: crossover of two random members with probability
    /// `p_crossover` (drawing the same member twice degrades to cloning),
    /// otherwise a clone of one random member. The child is mutated before
    /// it is returned and carries no fitness.
    #[must_use]
    pub fn breed<R: Rng>(
        &self,
        cfg: &EvolutionConfig,
        registry: &InnovationRegistry,
        rng: &mut R,
    ) -> Organism {
        let mut child = if rng.random::<f32>() < cfg.p_crossover {
            let a = rng.random_range(0..self.members.len());
            let b = rng.random_range(0..self.members.len());
            if a == b {
                self.members[a].clone()
            } else {
                self.members[a].crossover(&self.members[b], cfg, rng)
            }
        } else {
            self.members[rng.random_range(0..self.members.len())].clone()
        };

        child.fitness = 0.0;
        child.adj_fitness = 0.0;
        child.mutate(cfg, registry, rng);
        child
    }

    /// Fitness sharing: write each member's adjusted fitness (raw fitness
    /// divided by member count) and return the species total.
    pub fn average_fitness(&mut self) -> f32 {
        let count = self.members.len() as f32;
        let mut total = 0.0;
        for member in &mut self.members {
            member.adj_fitness = member.fitness / count;
            total += member.adj_fitness;
        }
        total
    }
}
