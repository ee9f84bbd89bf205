//! XOR demo: evolve a network that solves the classic XOR benchmark.
//!
//! Run with: `cargo run --example xor`

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use speciate::{
    EvalCoordinator, EvalError, EvolutionConfig, FitnessEvaluator, Network, Organism, Pool,
};

const TRUTH_TABLE: [([f32; 2], f32); 4] = [
    ([0.0, 0.0], 0.0),
    ([0.0, 1.0], 1.0),
    ([1.0, 0.0], 1.0),
    ([1.0, 1.0], 0.0),
];

/// XOR fitness: 4 minus the squared error over the truth table, so a
/// perfect network scores 4.0.
struct XorFitness;

impl FitnessEvaluator for XorFitness {
    fn evaluate(&self, network: &mut Network) -> Result<f32, EvalError> {
        let mut error = 0.0;
        for (inputs, expected) in &TRUTH_TABLE {
            let out = network.run(inputs)?;
            error += (out[0] - expected).powi(2);
        }
        Ok(4.0 - error)
    }
}

fn main() {
    println!("Speciated NEAT XOR demo");
    println!("=======================\n");

    let config = EvolutionConfig::new(2, 1, 16, 150);
    let generations = 100;
    let seed = 42;

    println!("Population: {}", config.population);
    println!("Generations: {generations}");
    println!();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut pool = Pool::new(config.clone(), &mut rng);
    let mut coordinator = EvalCoordinator::new(Arc::new(XorFitness));

    let mut solved_at = None;
    for gen in 0..generations {
        let summary = match pool.advance(&mut coordinator, &mut rng) {
            Ok(summary) => summary,
            Err(err) => {
                eprintln!("run ended: {err}");
                return;
            }
        };

        if summary.best_fitness >= 3.9 && solved_at.is_none() {
            solved_at = Some(summary.generation);
        }

        if gen % 10 == 0 || gen == generations - 1 {
            println!(
                "Gen {:3}: best={:.4}, population={}, species={}",
                summary.generation, summary.best_fitness, summary.population, summary.species
            );
        }
    }

    println!("\nEvolution complete!");
    if let Some(gen) = solved_at {
        println!("Solution found at generation {gen}");
    }

    let champion = pool
        .species()
        .iter()
        .flat_map(|s| s.members.iter())
        .max_by(|a, b| a.fitness.total_cmp(&b.fitness));
    let Some(champion) = champion else {
        println!("No champion: population is extinct");
        return;
    };

    report_champion(champion, &config);
}

fn report_champion(champion: &Organism, config: &EvolutionConfig) {
    println!("Champion fitness: {:.4}", champion.fitness);
    println!(
        "Genes: {} ({} enabled), hidden watermark: {}",
        champion.genes.len(),
        champion.genes.iter().filter(|g| g.enabled).count(),
        champion.max_neuron
    );

    println!("\nChampion XOR outputs:");
    let mut network = Network::from_organism(champion, config);
    for (inputs, expected) in &TRUTH_TABLE {
        match network.run(inputs) {
            Ok(out) => {
                let rounded = if out[0] > 0.5 { 1.0 } else { 0.0 };
                let status = if (rounded - expected).abs() < 0.1 {
                    "ok"
                } else {
                    "miss"
                };
                println!(
                    "  {} XOR {} = {:.4} (expected {}) {}",
                    inputs[0] as i32, inputs[1] as i32, out[0], *expected as i32, status
                );
            }
            Err(err) => println!("  evaluation failed: {err}"),
        }
    }
}
