use viscotune::testing::{diluting_viscosity, linear_solids, reference_formulation};
use viscotune::{
    Engine, HistoricalDataset, Ingredient, ProportionalScaler, StochasticOptions, Strategy,
    TargetSpec,
};

fn main() -> Result<(), String> {
    let formulation = reference_formulation();
    let target = TargetSpec::new(5400.0);

    let history = HistoricalDataset::from_formulations([&formulation
        .clone()
        .with(Ingredient::Other, 120.0)
        .with_variables(71.0, 214.5)])
    .map_err(|error| format!("{error}"))?;

    let engine = Engine::builder(diluting_viscosity(), linear_solids())
        .with_history(history)
        .build();

    let mut stochastic = StochasticOptions::default();
    stochastic.set_seed(Some(2024));

    let strategies = [
        Strategy::default(),
        Strategy::WarmStarted(Default::default()),
        Strategy::Constrained(Default::default()),
        Strategy::Stochastic(stochastic),
    ];

    for strategy in &strategies {
        let result = engine
            .run(strategy, &formulation, target)
            .map_err(|error| format!("{}: {error}", strategy.name()))?;

        println!("{result}\n");
    }

    let scaled = ProportionalScaler::default()
        .scale_to(&formulation, 1000.0)
        .map_err(|error| format!("{error}"))?;

    println!("scaled to 1000:");
    for (ingredient, value) in scaled.iter() {
        println!("  {:<22} {}", ingredient.name(), value);
    }

    Ok(())
}
