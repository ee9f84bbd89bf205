//! The population pool and its generation state machine.
//!
//! The pool owns every species and drives one generation at a time:
//! evaluate everything behind the coordinator's barrier, cull, retire
//! stagnant species, allocate offspring by shared fitness, speciate the
//! children, then checkpoint. Genome mutation, crossover and speciation all
//! run on the caller's thread; only fitness evaluation is parallel.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::EvolutionConfig;
use crate::error::{EvalError, EvolveError, NetworkError, SnapshotError};
use crate::evaluate::EvalCoordinator;
use crate::genome::Organism;
use crate::innovation::InnovationRegistry;
use crate::network::Network;
use crate::snapshot::{
    self, InnovationRecord, OrganismRecord, PoolSnapshot, SpeciesRecord, SNAPSHOT_VERSION,
};
use crate::species::Species;

/// What one completed generation looked like, for the caller's reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSummary {
    /// Generation counter after the advance.
    pub generation: u64,
    /// Population size after reproduction and speciation.
    pub population: usize,
    /// Number of species after reproduction and speciation.
    pub species: usize,
    /// Best fitness ever observed in the run.
    pub best_fitness: f32,
}

/// The set of all species plus run-level bookkeeping.
pub struct Pool {
    species: Vec<Species>,
    generation: u64,
    target_population: usize,
    global_best: f32,
    config: EvolutionConfig,
    registry: Arc<InnovationRegistry>,
}

impl Pool {
    /// New pool with a fresh innovation registry, seeded with one species
    /// holding one minimal organism carrying a single random link.
    #[must_use]
    pub fn new<R: Rng>(config: EvolutionConfig, rng: &mut R) -> Self {
        let registry = Arc::new(InnovationRegistry::new());
        let mut seed = Organism::new(&config);
        seed.add_random_link(&config, &registry, rng);

        let mut pool = Self {
            species: Vec::new(),
            generation: 0,
            target_population: config.population,
            global_best: f32::NEG_INFINITY,
            config,
            registry,
        };
        pool.assign_to_species(seed);
        pool
    }

    /// Current generation counter.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// All species.
    #[must_use]
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    /// Best fitness ever observed, if any generation completed.
    #[must_use]
    pub fn global_best(&self) -> Option<f32> {
        if self.global_best.is_finite() {
            Some(self.global_best)
        } else {
            None
        }
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// The shared innovation registry for this run.
    #[must_use]
    pub fn registry(&self) -> &Arc<InnovationRegistry> {
        &self.registry
    }

    /// Total number of organisms across all species.
    #[must_use]
    pub fn population_size(&self) -> usize {
        self.species.iter().map(|s| s.members.len()).sum()
    }

    /// Place an organism into the first compatible species, founding a new
    /// species when none accepts it.
    pub fn assign_to_species(&mut self, child: Organism) {
        for species in &mut self.species {
            if species.compatible(&child, &self.config) {
                species.add_member(child);
                return;
            }
        }
        debug!(
            species = self.species.len() + 1,
            "organism incompatible with every species, founding a new one"
        );
        self.species.push(Species::new(child));
    }

    /// Run one full generation.
    ///
    /// Order is fixed: evaluate everything (hard barrier), trim each species
    /// to its survival fraction, retire stagnant species, allocate offspring
    /// by shared fitness against the fixed population target, collapse small
    /// stagnant species, speciate the children, advance the counter,
    /// checkpoint.
    ///
    /// # Errors
    ///
    /// [`EvolveError::Extinct`] when no species remains,
    /// [`EvolveError::Cancelled`] when evaluation was cancelled (no state
    /// has changed), and [`EvolveError::Structural`] on phenotype
    /// internal-consistency faults.
    pub fn advance<R: Rng>(
        &mut self,
        coordinator: &mut EvalCoordinator,
        rng: &mut R,
    ) -> Result<GenerationSummary, EvolveError> {
        if self.species.is_empty() {
            return Err(EvolveError::Extinct(self.generation));
        }

        self.evaluate_generation(coordinator)?;

        // (1) trim each species to its survival fraction
        self.cull(false);

        // (2) stagnation-driven extinction
        self.remove_stagnant()?;

        // (3) recompute population size and shared-fitness totals
        let population = self.population_size();
        let species_adj: Vec<f32> = self
            .species
            .iter_mut()
            .map(Species::average_fitness)
            .collect();
        let total_adj: f32 = species_adj.iter().sum();

        // (4) offspring proportional to each species' share of adjusted
        // fitness, never exceeding the headroom left under the fixed target
        let mut remaining = self.target_population.saturating_sub(population);
        let mut children = Vec::with_capacity(remaining);
        if total_adj > 0.0 {
            for (index, adj) in species_adj.iter().enumerate() {
                if remaining == 0 {
                    break;
                }
                let share = adj / total_adj;
                let quota = ((share * self.target_population as f32).floor() as usize)
                    .min(remaining);
                for _ in 0..quota {
                    children.push(self.species[index].breed(&self.config, &self.registry, rng));
                }
                remaining -= quota;
            }
        }

        // (5) fill the shortfall from randomly chosen species
        while remaining > 0 {
            let index = rng.random_range(0..self.species.len());
            children.push(self.species[index].breed(&self.config, &self.registry, rng));
            remaining -= 1;
        }

        // (6) collapse small stagnant species to survivors only
        self.cull(true);

        // (7) speciate the new offspring
        for child in children {
            self.assign_to_species(child);
        }

        // (8) advance the generation counter
        self.generation += 1;

        // (9) checkpoint at the generation boundary
        self.maybe_checkpoint();

        let summary = GenerationSummary {
            generation: self.generation,
            population: self.population_size(),
            species: self.species.len(),
            best_fitness: self.global_best,
        };
        info!(
            generation = summary.generation,
            population = summary.population,
            species = summary.species,
            best_fitness = summary.best_fitness,
            "generation complete"
        );
        Ok(summary)
    }

    /// Build every member's phenotype, dispatch the connected ones to the
    /// coordinator, and write fitness back. Returns only once every organism
    /// has a fitness for this generation.
    fn evaluate_generation(&mut self, coordinator: &mut EvalCoordinator) -> Result<(), EvolveError> {
        let mut jobs = Vec::new();
        let mut slots: Vec<(usize, usize)> = Vec::new();

        for (species_index, species) in self.species.iter_mut().enumerate() {
            for (member_index, member) in species.members.iter_mut().enumerate() {
                let network = Network::from_organism(member, &self.config);
                if network.outputs_connected() {
                    let id = slots.len();
                    slots.push((species_index, member_index));
                    jobs.push((id, network));
                } else {
                    // Structurally useless phenotype: fitness is 0 by
                    // definition, the evaluator is never invoked.
                    member.fitness = 0.0;
                }
            }
            species.mark_unsorted();
        }

        let results = coordinator
            .evaluate_batch(jobs)
            .map_err(|_| EvolveError::Cancelled(self.generation))?;

        for (id, result) in results {
            let (species_index, member_index) = slots[id];
            let member = &mut self.species[species_index].members[member_index];
            match result {
                Ok(fitness) => member.fitness = fitness,
                Err(EvalError::Network(fault @ NetworkError::UnknownNeuron(_))) => {
                    return Err(EvolveError::Structural(fault));
                }
                Err(err) => {
                    warn!(%err, "evaluation failed, assigning zero fitness");
                    member.fitness = 0.0;
                }
            }
        }

        for species in &self.species {
            for member in &species.members {
                if member.fitness > self.global_best {
                    self.global_best = member.fitness;
                }
            }
        }
        Ok(())
    }

    /// Cull every species in the requested mode.
    fn cull(&mut self, all_but_top: bool) {
        for species in &mut self.species {
            species.cull(all_but_top, &self.config);
        }
    }

    /// Remove species whose stagnation counter reached the limit, keeping
    /// any species that holds the run's best fitness. If the removal would
    /// leave fewer than the configured minimum, the top-ranked species by
    /// current best fitness survive instead.
    fn remove_stagnant(&mut self) -> Result<(), EvolveError> {
        let limit = self.config.stagnation_limit;
        let global_best = self.global_best;

        let survivors = self
            .species
            .iter()
            .filter(|s| s.stagnation < limit || s.best_fitness >= global_best)
            .count();

        if survivors < self.config.min_species {
            self.species.sort_by(|a, b| {
                current_best(b)
                    .total_cmp(&current_best(a))
            });
            self.species.truncate(self.config.min_species);
        } else {
            self.species
                .retain(|s| s.stagnation < limit || s.best_fitness >= global_best);
        }

        if self.species.is_empty() {
            return Err(EvolveError::Extinct(self.generation));
        }
        Ok(())
    }

    /// Write a checkpoint when the configured interval says so. Failures are
    /// logged and otherwise ignored; losing a checkpoint never aborts
    /// evolution.
    fn maybe_checkpoint(&self) {
        let Some(policy) = &self.config.checkpoint else {
            return;
        };
        if policy.interval == 0 || self.generation % policy.interval != 0 {
            return;
        }
        let snapshot = self.snapshot();
        match snapshot::write_checkpoint(&policy.dir, &snapshot) {
            Ok(path) => debug!(path = %path.display(), "checkpoint written"),
            Err(err) => warn!(%err, "checkpoint write failed, continuing"),
        }
    }

    /// Capture the pool as a versioned snapshot.
    #[must_use]
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            version: SNAPSHOT_VERSION,
            generation: self.generation,
            target_population: self.target_population,
            global_best: self.global_best(),
            config: self.config.clone(),
            species: self
                .species
                .iter()
                .map(|s| SpeciesRecord {
                    members: s
                        .members
                        .iter()
                        .map(|m| OrganismRecord {
                            genes: m.genes.iter().map(Into::into).collect(),
                            max_neuron: m.max_neuron,
                            fitness: m.fitness,
                        })
                        .collect(),
                    stagnation: s.stagnation,
                    best_fitness: if s.best_fitness.is_finite() {
                        Some(s.best_fitness)
                    } else {
                        None
                    },
                })
                .collect(),
            innovations: self
                .registry
                .entries()
                .into_iter()
                .map(|(source, target, marking)| InnovationRecord {
                    source,
                    target,
                    marking,
                })
                .collect(),
        }
    }

    /// Rebuild a pool from a snapshot, resuming the generation loop exactly
    /// where it left off.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Version`] when the snapshot was written by an
    /// incompatible format version.
    pub fn restore(snapshot: PoolSnapshot) -> Result<Self, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version(snapshot.version));
        }

        let config = snapshot.config;
        let entries: Vec<(u32, u32, u64)> = snapshot
            .innovations
            .iter()
            .map(|r| (r.source, r.target, r.marking))
            .collect();
        let registry = Arc::new(InnovationRegistry::from_entries(&entries));

        let mut species = Vec::with_capacity(snapshot.species.len());
        for record in &snapshot.species {
            let mut members = record.members.iter().map(|m| {
                let mut organism = Organism::new(&config);
                for gene in &m.genes {
                    organism.push_gene(gene.into());
                }
                organism.max_neuron = m.max_neuron;
                organism.fitness = m.fitness;
                organism
            });
            let Some(first) = members.next() else {
                continue;
            };
            let mut restored = Species::new(first);
            for member in members {
                restored.add_member(member);
            }
            restored.stagnation = record.stagnation;
            restored.best_fitness = record.best_fitness.unwrap_or(f32::NEG_INFINITY);
            species.push(restored);
        }

        Ok(Self {
            species,
            generation: snapshot.generation,
            target_population: snapshot.target_population,
            global_best: snapshot.global_best.unwrap_or(f32::NEG_INFINITY),
            config,
            registry,
        })
    }
}

/// A species' best member fitness as currently evaluated.
fn current_best(species: &Species) -> f32 {
    species
        .members
        .iter()
        .map(|m| m.fitness)
        .fold(f32::NEG_INFINITY, f32::max)
}
