use criterion::{criterion_group, criterion_main, Criterion};
use viscotune::{
    testing::*, ConstrainedOptions, Engine, HistoricalDataset, Ingredient, StochasticOptions,
    Strategy, TargetSpec,
};

const TARGET: f64 = 5400.0;

fn stepping(c: &mut Criterion) {
    let engine = Engine::new(diluting_viscosity(), linear_solids());
    let f = reference_formulation();

    c.bench_function("stepping", |b| {
        b.iter(|| engine.adjust(&f, TARGET))
    });
}

fn warm_started(c: &mut Criterion) {
    let f = reference_formulation();
    let history = HistoricalDataset::from_formulations(
        (0..100)
            .map(|i| {
                f.clone()
                    .with(Ingredient::EmulsionA, 1500.0 + 10.0 * i as f64)
                    .with_variables(60.0 + 0.3 * i as f64, 200.0 + 0.2 * i as f64)
            })
            .collect::<Vec<_>>()
            .iter(),
    )
    .unwrap();

    let engine = Engine::builder(diluting_viscosity(), linear_solids())
        .with_history(history)
        .build();

    c.bench_function("warm-started stepping", |b| {
        b.iter(|| engine.adjust_warm_started(&f, TARGET))
    });
}

fn constrained(c: &mut Criterion) {
    let engine = Engine::new(diluting_viscosity(), linear_solids());
    let f = reference_formulation();
    let strategy = Strategy::Constrained(ConstrainedOptions::default());

    c.bench_function("constrained", |b| {
        b.iter(|| engine.run(&strategy, &f, TargetSpec::new(TARGET)))
    });
}

fn stochastic(c: &mut Criterion) {
    let engine = Engine::new(diluting_viscosity(), linear_solids());
    let f = reference_formulation();

    let mut options = StochasticOptions::default();
    options.set_seed(Some(3));
    let strategy = Strategy::Stochastic(options);

    c.bench_function("stochastic", |b| {
        b.iter(|| engine.run(&strategy, &f, TARGET))
    });
}

criterion_group!(strategies, stepping, warm_started, constrained, stochastic);
criterion_main!(strategies);
