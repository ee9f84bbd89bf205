//! Benchmarks for speciate.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use speciate::{
    EvalCoordinator, EvalError, EvolutionConfig, FitnessEvaluator, InnovationRegistry, Network,
    Organism, Pool,
};

fn grown_organism(cfg: &EvolutionConfig, registry: &InnovationRegistry, seed: u64) -> Organism {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut organism = Organism::new(cfg);
    organism.add_random_link(cfg, registry, &mut rng);
    for _ in 0..20 {
        organism.mutate(cfg, registry, &mut rng);
    }
    organism
}

fn bench_mutation(c: &mut Criterion) {
    let cfg = EvolutionConfig::new(4, 2, 32, 50);
    let registry = InnovationRegistry::new();
    let organism = grown_organism(&cfg, &registry, 42);

    c.bench_function("organism_mutation", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut g = organism.clone();
        b.iter(|| {
            g.mutate(&cfg, &registry, &mut rng);
            black_box(&g);
        });
    });
}

fn bench_crossover(c: &mut Criterion) {
    let cfg = EvolutionConfig::new(4, 2, 32, 50);
    let registry = InnovationRegistry::new();
    let mut parent1 = grown_organism(&cfg, &registry, 42);
    let mut parent2 = grown_organism(&cfg, &registry, 43);
    parent1.fitness = 2.0;
    parent2.fitness = 1.0;

    c.bench_function("organism_crossover", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        b.iter(|| {
            black_box(parent1.crossover(&parent2, &cfg, &mut rng));
        });
    });
}

fn bench_compatibility(c: &mut Criterion) {
    let cfg = EvolutionConfig::new(4, 2, 32, 50);
    let registry = InnovationRegistry::new();
    let genome1 = grown_organism(&cfg, &registry, 42);
    let genome2 = grown_organism(&cfg, &registry, 99);

    c.bench_function("compatibility_distance", |b| {
        b.iter(|| {
            black_box(genome1.compatibility(&genome2, &cfg));
        });
    });
}

fn bench_network_run(c: &mut Criterion) {
    let cfg = EvolutionConfig::new(4, 2, 32, 50);
    let registry = InnovationRegistry::new();
    let organism = grown_organism(&cfg, &registry, 42);
    let mut network = Network::from_organism(&organism, &cfg);

    c.bench_function("network_run", |b| {
        b.iter(|| {
            black_box(network.run(&[0.5, -0.5, 0.25, 1.0]).ok());
        });
    });
}

fn bench_pool_generation(c: &mut Criterion) {
    let evaluator: Arc<dyn FitnessEvaluator> =
        Arc::new(|net: &mut Network| -> Result<f32, EvalError> {
            Ok(net.run(&[0.5, -0.5])?[0])
        });

    c.bench_function("pool_generation_pop50", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut pool = Pool::new(EvolutionConfig::new(2, 1, 16, 50), &mut rng);
        let mut coordinator = EvalCoordinator::with_workers(evaluator.clone(), 4);
        b.iter(|| {
            pool.advance(&mut coordinator, &mut rng).expect("advance");
        });
    });
}

criterion_group!(
    benches,
    bench_mutation,
    bench_crossover,
    bench_compatibility,
    bench_network_run,
    bench_pool_generation,
);
criterion_main!(benches);
