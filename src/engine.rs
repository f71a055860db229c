//! The tuning engine.
//!
//! [`Engine`] owns the two predictors and the feature assembler, and runs one
//! of the four strategies on a formulation snapshot:
//!
//! * [`Strategy::Stepping`] -- fixed steps from the current water and
//!   Solution E until the viscosity is within tolerance.
//! * [`Strategy::WarmStarted`] -- the same, but starting from the closest
//!   historical batch.
//! * [`Strategy::Constrained`] -- bounded Nelder-Mead on the penalty
//!   objective with a hard mass inequality.
//! * [`Strategy::Stochastic`] -- particle swarm on the penalty objective with
//!   soft mass terms.
//!
//! The engine holds no state between runs. Every run validates its input,
//! builds a fresh [`TuningProblem`] and returns a new
//! [`OptimizationResult`]. A run can be interrupted from another thread with
//! a [`CancelToken`] or bounded by a timeout; both are checked once per
//! iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use getset::{CopyGetters, Getters, Setters};
use log::{debug, info, warn};
use rand::{rngs::StdRng, SeedableRng};

use crate::algo::nelder_mead::{NelderMeadError, NelderMeadOptions};
use crate::algo::particle_swarm::ParticleSwarmOptions;
use crate::algo::stepping::{Step, SteppingOptions};
use crate::algo::{NelderMead, ParticleSwarm, Stepping};
use crate::core::{Domain, Problem};
use crate::driver::OptimizerDriver;
use crate::error::{Error, FailureReason, Result, ValidationError};
use crate::features::FeatureAssembler;
use crate::formulation::Formulation;
use crate::predictor::Predictor;
use crate::problem::{
    ConstrainedObjective, StochasticObjective, TargetSpec, TuningProblem,
    DEFAULT_CLOSENESS_WEIGHT,
};
use crate::report::OptimizationResult;
use crate::warm_start::HistoricalDataset;

/// Cooperative cancellation flag shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token which is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every run observing this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for [`Strategy::Constrained`].
#[derive(Debug, Clone, CopyGetters, Getters, Setters)]
pub struct ConstrainedOptions {
    /// Options of the simplex method.
    #[getset(get = "pub", set = "pub")]
    simplex: NelderMeadOptions,
    /// Maximum number of simplex iterations. Default: `500`.
    #[getset(get_copy = "pub", set = "pub")]
    max_iterations: usize,
    /// The search is converged when the objective values across the simplex
    /// differ by at most this. Default: `1e-6`.
    #[getset(get_copy = "pub", set = "pub")]
    tolerance: f64,
}

impl Default for ConstrainedOptions {
    fn default() -> Self {
        Self {
            simplex: NelderMeadOptions::default(),
            max_iterations: 500,
            tolerance: 1e-6,
        }
    }
}

impl ConstrainedOptions {
    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(option("max_iterations", "must be positive"));
        }

        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(option("tolerance", "must be a non-negative number"));
        }

        Ok(())
    }
}

/// Options for [`Strategy::Stochastic`].
#[derive(Debug, Clone, CopyGetters, Getters, Setters)]
pub struct StochasticOptions {
    /// Options of the swarm.
    #[getset(get = "pub", set = "pub")]
    swarm: ParticleSwarmOptions,
    /// Number of swarm updates after the initial evaluation. Default: `30`.
    #[getset(get_copy = "pub", set = "pub")]
    max_iterations: usize,
    /// Seed of the random generator, `None` draws from entropy. Default:
    /// `None`.
    #[getset(get_copy = "pub", set = "pub")]
    seed: Option<u64>,
    /// Weight of the signed closeness term of the mass penalty. Default:
    /// [`DEFAULT_CLOSENESS_WEIGHT`].
    #[getset(get_copy = "pub", set = "pub")]
    closeness_weight: f64,
    /// Fail when the best candidate is outside an acceptance band instead of
    /// returning it. Default: `false`.
    #[getset(get_copy = "pub", set = "pub")]
    require_feasible: bool,
}

impl Default for StochasticOptions {
    fn default() -> Self {
        Self {
            swarm: ParticleSwarmOptions::default(),
            max_iterations: 30,
            seed: None,
            closeness_weight: DEFAULT_CLOSENESS_WEIGHT,
            require_feasible: false,
        }
    }
}

impl StochasticOptions {
    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(option("max_iterations", "must be positive"));
        }

        if self.swarm.population_size() == 0 {
            return Err(option("population_size", "must be positive"));
        }

        let coefficients = [
            self.swarm.inertia(),
            self.swarm.cognitive(),
            self.swarm.social(),
            self.swarm.velocity_factor(),
            self.closeness_weight,
        ];

        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(option("coefficient", "must be finite"));
        }

        Ok(())
    }
}

fn option(name: &'static str, reason: &'static str) -> Error {
    ValidationError::Option { name, reason }.into()
}

/// Tuning strategy together with its options.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Fixed-step search from the formulation's current values.
    Stepping(SteppingOptions),
    /// Fixed-step search from the closest historical batch.
    WarmStarted(SteppingOptions),
    /// Bounded Nelder-Mead with the hard mass inequality.
    Constrained(ConstrainedOptions),
    /// Particle swarm with soft mass terms.
    Stochastic(StochasticOptions),
}

impl Strategy {
    /// Name used in logs and results.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Stepping(_) => "stepping",
            Strategy::WarmStarted(_) => "warm-started stepping",
            Strategy::Constrained(_) => "constrained",
            Strategy::Stochastic(_) => "stochastic",
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Stepping(SteppingOptions::default())
    }
}

/// Builder for the [`Engine`].
pub struct EngineBuilder<V, S> {
    viscosity: V,
    solids: S,
    assembler: FeatureAssembler,
    history: Option<HistoricalDataset>,
    cancel: Option<CancelToken>,
    timeout: Option<Duration>,
}

impl<V, S> EngineBuilder<V, S> {
    /// Sets the historical batches used by the warm start.
    pub fn with_history(mut self, history: HistoricalDataset) -> Self {
        self.history = Some(history);
        self
    }

    /// Replaces the canonical feature schemas.
    pub fn with_assembler(mut self, assembler: FeatureAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Makes every run observe given token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Limits the wall-clock time of every run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the [`Engine`].
    pub fn build(self) -> Engine<V, S> {
        let Self {
            viscosity,
            solids,
            assembler,
            history,
            cancel,
            timeout,
        } = self;

        Engine {
            viscosity,
            solids,
            assembler,
            history,
            cancel,
            timeout,
        }
    }
}

/// The tuning engine.
///
/// See [module](self) documentation for more details.
pub struct Engine<V, S> {
    viscosity: V,
    solids: S,
    assembler: FeatureAssembler,
    history: Option<HistoricalDataset>,
    cancel: Option<CancelToken>,
    timeout: Option<Duration>,
}

impl<V, S> Engine<V, S> {
    /// Returns the builder for specifying additional settings.
    pub fn builder(viscosity: V, solids: S) -> EngineBuilder<V, S> {
        EngineBuilder {
            viscosity,
            solids,
            assembler: FeatureAssembler::default(),
            history: None,
            cancel: None,
            timeout: None,
        }
    }

    /// Initializes the engine with the canonical schemas and no history.
    pub fn new(viscosity: V, solids: S) -> Self {
        Self::builder(viscosity, solids).build()
    }

    /// The feature assembler.
    pub fn assembler(&self) -> &FeatureAssembler {
        &self.assembler
    }

    /// The historical batches, if any.
    pub fn history(&self) -> Option<&HistoricalDataset> {
        self.history.as_ref()
    }
}

impl<V: Predictor, S: Predictor> Engine<V, S> {
    /// Stepping search from the formulation's current values.
    pub fn adjust(
        &self,
        formulation: &Formulation,
        target: impl Into<TargetSpec>,
    ) -> Result<OptimizationResult> {
        self.run(&Strategy::default(), formulation, target)
    }

    /// Stepping search from the closest historical batch.
    pub fn adjust_warm_started(
        &self,
        formulation: &Formulation,
        target: impl Into<TargetSpec>,
    ) -> Result<OptimizationResult> {
        self.run(
            &Strategy::WarmStarted(SteppingOptions::default()),
            formulation,
            target,
        )
    }

    /// Bounded Nelder-Mead with the hard mass inequality.
    pub fn optimize_constrained(
        &self,
        formulation: &Formulation,
        target: impl Into<TargetSpec>,
    ) -> Result<OptimizationResult> {
        self.run(
            &Strategy::Constrained(ConstrainedOptions::default()),
            formulation,
            target,
        )
    }

    /// Particle swarm with soft mass terms.
    pub fn optimize_stochastic(
        &self,
        formulation: &Formulation,
        target: impl Into<TargetSpec>,
        population_size: usize,
        max_iterations: usize,
    ) -> Result<OptimizationResult> {
        let mut options = StochasticOptions::default();
        options.swarm.set_population_size(population_size);
        options.set_max_iterations(max_iterations);

        self.run(&Strategy::Stochastic(options), formulation, target)
    }

    /// Runs given strategy.
    pub fn run(
        &self,
        strategy: &Strategy,
        formulation: &Formulation,
        target: impl Into<TargetSpec>,
    ) -> Result<OptimizationResult> {
        let target = target.into();
        let interrupt = Interrupt::new(self.cancel.as_ref(), self.timeout);

        info!(
            "running {} strategy, target viscosity = {}",
            strategy.name(),
            target.viscosity()
        );

        let problem = TuningProblem::new(
            &self.viscosity,
            &self.solids,
            &self.assembler,
            formulation,
            target,
        )?;

        let result = match strategy {
            Strategy::Stepping(options) => {
                let start = problem.initial();
                run_stepping(&problem, options, start, strategy.name(), &interrupt)
            }
            Strategy::WarmStarted(options) => {
                let history = self.history.as_ref().ok_or(Error::EmptyDataset)?;
                let start = history.locate_for(formulation)?;
                debug!(
                    "warm start at water = {}, solution_e = {}",
                    start.0, start.1
                );
                run_stepping(&problem, options, start, strategy.name(), &interrupt)
            }
            Strategy::Constrained(options) => {
                run_constrained(&problem, options, strategy.name(), &interrupt)
            }
            Strategy::Stochastic(options) => {
                run_stochastic(&problem, options, strategy.name(), &interrupt)
            }
        }?;

        info!(
            "{} strategy finished after {} iterations ({} evaluations): water = {:.2}, solution_e = {:.2}, viscosity = {:.2}",
            result.strategy(),
            result.iterations(),
            result.evaluations(),
            result.water(),
            result.solution_e(),
            result.viscosity()
        );

        Ok(result)
    }
}

/// Cancellation and deadline check done once per iteration.
struct Interrupt<'a> {
    cancel: Option<&'a CancelToken>,
    deadline: Option<Instant>,
}

impl<'a> Interrupt<'a> {
    fn new(cancel: Option<&'a CancelToken>, timeout: Option<Duration>) -> Self {
        Self {
            cancel,
            // A deadline beyond what `Instant` can represent is no deadline.
            deadline: timeout.and_then(|timeout| Instant::now().checked_add(timeout)),
        }
    }

    fn check(&self) -> Result<()> {
        if self.cancel.map_or(false, CancelToken::is_cancelled) {
            return Err(Error::Cancelled);
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

fn run_stepping<V: Predictor, S: Predictor>(
    problem: &TuningProblem<'_, V, S>,
    options: &SteppingOptions,
    start: (f64, f64),
    name: &'static str,
    interrupt: &Interrupt<'_>,
) -> Result<OptimizationResult> {
    options.validate()?;

    let mut stepping = Stepping::with_options(options.clone());
    let mut x = start;

    for _ in 0..options.max_iterations() {
        interrupt.check()?;

        if let Step::Converged(prediction) = stepping.step(problem, &mut x)? {
            return Ok(OptimizationResult::new(
                problem,
                x,
                prediction,
                name,
                stepping.iterations(),
            ));
        }
    }

    // The last move may have left the range.
    stepping.check_bounds(x)?;

    Err(FailureReason::MaxIterations(options.max_iterations()).into())
}

/// Projects the formulation's values into the domain and tops the variables
/// up so that the batch is not lighter than the original one.
///
/// Solution E is topped up first.
fn feasible_start<V, S>(problem: &TuningProblem<'_, V, S>, dom: &Domain) -> Result<(f64, f64)> {
    let (w0, e0) = problem.initial();
    let mut water = w0.clamp(dom.lower(0), dom.upper(0));
    let mut solution_e = e0.clamp(dom.lower(1), dom.upper(1));

    let mut deficit = (w0 + e0) - (water + solution_e);

    if deficit > 0.0 {
        let add = deficit.min(dom.upper(1) - solution_e);
        solution_e += add;
        deficit -= add;

        let add = deficit.min(dom.upper(0) - water);
        water += add;
    }

    if !problem.keeps_mass(water, solution_e) {
        return Err(FailureReason::Infeasible("original mass cannot be kept within bounds").into());
    }

    if (water, solution_e) != (w0, e0) {
        warn!(
            "initial point repaired from ({}, {}) to ({}, {})",
            w0, e0, water, solution_e
        );
    }

    Ok((water, solution_e))
}

fn run_constrained<V: Predictor, S: Predictor>(
    problem: &TuningProblem<'_, V, S>,
    options: &ConstrainedOptions,
    name: &'static str,
    interrupt: &Interrupt<'_>,
) -> Result<OptimizationResult> {
    options.validate()?;

    let objective = ConstrainedObjective::new(problem);
    let (water, solution_e) = feasible_start(problem, &objective.domain())?;
    problem.predict(water, solution_e).check()?;

    let mut driver = OptimizerDriver::builder(&objective)
        .with_initial(vec![water, solution_e])
        .with_algo(|f, dom| NelderMead::with_options(f, dom, options.simplex().clone()))
        .build();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations() {
        interrupt.check()?;
        iterations += 1;

        match driver.next() {
            Ok(_) => {
                if driver
                    .algo()
                    .spread()
                    .map_or(false, |spread| spread <= options.tolerance())
                {
                    converged = true;
                    break;
                }
            }
            Err(NelderMeadError::SimplexCollapsed) => {
                debug!("simplex collapsed after {} iterations", iterations);
                converged = true;
                break;
            }
            Err(error) => return Err(FailureReason::from(error).into()),
        }
    }

    if !converged {
        return Err(FailureReason::NotConverged(options.max_iterations()).into());
    }

    let (water, solution_e) = (driver.x()[0], driver.x()[1]);

    if !problem.keeps_mass(water, solution_e) {
        return Err(FailureReason::Infeasible("mass constraint violated").into());
    }

    let prediction = problem.predict(water, solution_e).check()?;

    if !problem.target().accepts(&prediction) {
        warn!("constrained optimum lies outside the acceptance bands");
    }

    Ok(OptimizationResult::new(
        problem,
        (water, solution_e),
        prediction,
        name,
        iterations,
    ))
}

fn run_stochastic<V: Predictor, S: Predictor>(
    problem: &TuningProblem<'_, V, S>,
    options: &StochasticOptions,
    name: &'static str,
    interrupt: &Interrupt<'_>,
) -> Result<OptimizationResult> {
    options.validate()?;

    let objective = StochasticObjective::new(problem, options.closeness_weight());
    let rng = match options.seed() {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (w0, e0) = problem.initial();
    let mut driver = OptimizerDriver::builder(&objective)
        .with_initial(vec![w0, e0])
        .with_algo(|f, dom| ParticleSwarm::with_options(f, dom, rng, options.swarm().clone()))
        .build();

    // Initial evaluation of the swarm, then the updates.
    for _ in 0..=options.max_iterations() {
        interrupt.check()?;
        driver.next()?;
    }

    if !driver.fx().is_finite() {
        return Err(FailureReason::NoValidCandidate.into());
    }

    let (water, solution_e) = (driver.x()[0], driver.x()[1]);
    let prediction = problem.predict(water, solution_e).check()?;

    if !problem.target().accepts(&prediction) {
        if options.require_feasible() {
            return Err(
                FailureReason::Infeasible("best candidate lies outside the acceptance bands")
                    .into(),
            );
        }

        warn!("best candidate lies outside the acceptance bands");
    }

    Ok(OptimizationResult::new(
        problem,
        (water, solution_e),
        prediction,
        name,
        options.max_iterations(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::features::FeatureVector;
    use crate::formulation::Ingredient;
    use crate::predictor::FnPredictor;
    use crate::testing::*;
    use crate::warm_start::HistoricalRecord;

    #[test]
    fn stepping_converges_at_reference() {
        let engine = Engine::new(linear_viscosity(), constant(0.52));
        let result = engine.adjust(&reference_formulation(), 5000.0).unwrap();

        assert_eq!(result.iterations(), 1);
        assert_relative_eq!(result.water(), 75.6);
        assert_relative_eq!(result.solution_e(), 210.0);
        assert_relative_eq!(
            result.total_mass(),
            reference_formulation().total_mass().unwrap(),
            epsilon = 1e-9
        );
        assert_eq!(result.strategy(), "stepping");
    }

    #[test]
    fn stepping_thickens() {
        // Every thickening step raises the viscosity by 50.
        let engine = Engine::new(diluting_viscosity(), constant(0.52));
        let result = engine.adjust(&reference_formulation(), 5590.0).unwrap();

        assert_eq!(result.iterations(), 9);
        assert_relative_eq!(result.water(), 67.6, epsilon = 1e-9);
        assert_relative_eq!(result.solution_e(), 218.0, epsilon = 1e-9);
        assert!(result.deviation() <= 200.0);
    }

    #[test]
    fn stepping_leaves_range() {
        let engine = Engine::new(constant(6000.0), constant(0.52));
        let f = reference_formulation().with_variables(100.0, 200.0);

        assert!(matches!(
            engine.adjust(&f, 5000.0),
            Err(Error::Validation(ValidationError::OutOfRange {
                ingredient: Ingredient::Water,
                ..
            }))
        ));
    }

    #[test]
    fn stepping_max_iterations() {
        let engine = Engine::new(constant(6000.0), constant(0.52));
        let mut options = SteppingOptions::default();
        options.set_max_iterations(5);

        assert!(matches!(
            engine.run(
                &Strategy::Stepping(options),
                &reference_formulation(),
                5000.0
            ),
            Err(Error::OptimizationFailure(FailureReason::MaxIterations(5)))
        ));
    }

    #[test]
    fn stepping_exhausted_out_of_range() {
        let engine = Engine::new(constant(6000.0), constant(0.52));
        let f = reference_formulation().with_variables(99.0, 200.0);
        let mut options = SteppingOptions::default();
        options.set_max_iterations(2);

        // The second move takes water from 100 to 101.
        assert!(matches!(
            engine.run(&Strategy::Stepping(options), &f, 5000.0),
            Err(Error::Validation(ValidationError::OutOfRange {
                ingredient: Ingredient::Water,
                ..
            }))
        ));
    }

    #[test]
    fn stepping_non_finite_solids() {
        let engine = Engine::new(linear_viscosity(), constant(f64::NAN));
        assert!(matches!(
            engine.adjust(&reference_formulation(), 5000.0),
            Err(Error::InvalidPrediction { what: "solids", .. })
        ));
    }

    #[test]
    fn warm_start_uses_history() {
        let history = HistoricalDataset::from_formulations([&reference_formulation()
            .with(Ingredient::Other, 100.0)
            .with_variables(67.6, 218.0)])
        .unwrap();

        let engine = Engine::builder(diluting_viscosity(), constant(0.52))
            .with_history(history)
            .build();

        let result = engine
            .adjust_warm_started(&reference_formulation(), 5590.0)
            .unwrap();

        assert_eq!(result.iterations(), 1);
        assert_relative_eq!(result.water(), 67.6);
        assert_eq!(result.strategy(), "warm-started stepping");
    }

    #[test]
    fn warm_start_without_history() {
        let engine = Engine::new(diluting_viscosity(), constant(0.52));
        assert!(matches!(
            engine.adjust_warm_started(&reference_formulation(), 5000.0),
            Err(Error::EmptyDataset)
        ));
    }

    #[test]
    fn constrained_keeps_mass() {
        let engine = Engine::new(linear_viscosity(), constant(0.52));
        let f = reference_formulation();
        let result = engine.optimize_constrained(&f, 5200.0).unwrap();

        assert!(result.total_mass() >= f.total_mass().unwrap() - 1e-6);
        assert!(result.deviation() < 10.0);
        assert!(result.feasible());
        assert!((10.0..=100.0).contains(&result.water()));
        assert!((100.0..=300.0).contains(&result.solution_e()));
    }

    #[test]
    fn constrained_not_converged() {
        let engine = Engine::new(linear_viscosity(), constant(0.52));
        let mut options = ConstrainedOptions::default();
        options.set_max_iterations(2);

        assert!(matches!(
            engine.run(
                &Strategy::Constrained(options),
                &reference_formulation(),
                5200.0
            ),
            Err(Error::OptimizationFailure(FailureReason::NotConverged(2)))
        ));
    }

    #[test]
    fn constrained_non_finite_solids() {
        let engine = Engine::new(linear_viscosity(), constant(f64::NAN));
        assert!(matches!(
            engine.optimize_constrained(&reference_formulation(), 5200.0),
            Err(Error::InvalidPrediction { what: "solids", .. })
        ));
    }

    #[test]
    fn constrained_infeasible_start() {
        let engine = Engine::new(linear_viscosity(), constant(0.52));
        // Water and Solution E together exceed what the bounds allow.
        let f = reference_formulation().with_variables(150.0, 290.0);

        assert!(matches!(
            engine.optimize_constrained(&f, 5000.0),
            Err(Error::OptimizationFailure(FailureReason::Infeasible(_)))
        ));
    }

    #[test]
    fn start_is_repaired() {
        let v = linear_viscosity();
        let s = constant(0.52);
        let assembler = FeatureAssembler::default();
        let f = reference_formulation().with_variables(5.0, 120.0);
        let problem = TuningProblem::new(&v, &s, &assembler, &f, TargetSpec::new(5000.0)).unwrap();

        let start = feasible_start(&problem, &crate::problem::continuous_domain()).unwrap();
        assert_eq!(start, (10.0, 120.0));

        let f = reference_formulation().with_variables(120.0, 250.0);
        let problem = TuningProblem::new(&v, &s, &assembler, &f, TargetSpec::new(5000.0)).unwrap();

        let start = feasible_start(&problem, &crate::problem::continuous_domain()).unwrap();
        assert_eq!(start, (100.0, 270.0));
    }

    #[test]
    fn stochastic_is_reproducible() {
        let engine = Engine::new(linear_viscosity(), linear_solids());
        let mut options = StochasticOptions::default();
        options.set_seed(Some(17));

        let strategy = Strategy::Stochastic(options);
        let a = engine
            .run(&strategy, &reference_formulation(), 5200.0)
            .unwrap();
        let b = engine
            .run(&strategy, &reference_formulation(), 5200.0)
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a.iterations(), 30);
        assert_eq!(a.evaluations(), 50 * 31 + 1);
        assert!((10.0..=100.0).contains(&a.water()));
        assert!((100.0..=300.0).contains(&a.solution_e()));
    }

    #[test]
    fn stochastic_require_feasible() {
        // The solids band can never be met.
        let engine = Engine::new(linear_viscosity(), constant(0.9));
        let mut options = StochasticOptions::default();
        options.set_seed(Some(1));
        options.set_max_iterations(2);
        options.set_require_feasible(true);

        assert!(matches!(
            engine.run(
                &Strategy::Stochastic(options),
                &reference_formulation(),
                5000.0
            ),
            Err(Error::OptimizationFailure(FailureReason::Infeasible(_)))
        ));
    }

    #[test]
    fn stochastic_no_valid_candidate() {
        let engine = Engine::new(constant(f64::NAN), constant(0.52));
        assert!(matches!(
            engine.optimize_stochastic(&reference_formulation(), 5000.0, 10, 2),
            Err(Error::OptimizationFailure(FailureReason::NoValidCandidate))
        ));
    }

    #[test]
    fn stochastic_avoids_non_finite_solids() {
        // Solids are undefined for more than 50 of water.
        let solids = FnPredictor::new(|features: &FeatureVector<'_>| {
            match features.get(Ingredient::Water) {
                Some(water) if water <= 50.0 => 0.52,
                _ => f64::NAN,
            }
        });
        let engine = Engine::new(linear_viscosity(), solids);
        let mut options = StochasticOptions::default();
        options.set_seed(Some(8));

        let result = engine
            .run(
                &Strategy::Stochastic(options),
                &reference_formulation(),
                5200.0,
            )
            .unwrap();

        assert!(result.water() <= 50.0);
        assert_relative_eq!(result.solids(), 0.52);
    }

    #[test]
    fn stochastic_empty_swarm() {
        let engine = Engine::new(linear_viscosity(), constant(0.52));
        assert!(matches!(
            engine.optimize_stochastic(&reference_formulation(), 5000.0, 0, 2),
            Err(Error::Validation(ValidationError::Option {
                name: "population_size",
                ..
            }))
        ));
    }

    #[test]
    fn cancelled_before_start() {
        let token = CancelToken::new();
        let engine = Engine::builder(constant(6000.0), constant(0.52))
            .with_cancel_token(token.clone())
            .build();

        token.cancel();
        assert!(matches!(
            engine.adjust(&reference_formulation(), 5000.0),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn deadline() {
        let engine = Engine::builder(linear_viscosity(), constant(0.52))
            .with_timeout(Duration::ZERO)
            .build();

        assert!(matches!(
            engine.optimize_constrained(&reference_formulation(), 5000.0),
            Err(Error::DeadlineExceeded)
        ));
    }

    #[test]
    fn unrepresentable_deadline_is_no_deadline() {
        let engine = Engine::builder(linear_viscosity(), constant(0.52))
            .with_timeout(Duration::MAX)
            .build();

        let result = engine.adjust(&reference_formulation(), 5000.0).unwrap();
        assert_eq!(result.iterations(), 1);
    }

    #[test]
    fn invalid_input() {
        let engine = Engine::new(linear_viscosity(), constant(0.52));

        let err = engine
            .adjust(&reference_formulation(), -1.0)
            .unwrap_err();
        assert!(err.is_input_error());

        let f = reference_formulation().with(Ingredient::SolutionF, -3.0);
        let err = engine.optimize_constrained(&f, 5000.0).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn caller_formulation_is_untouched() {
        let engine = Engine::new(diluting_viscosity(), constant(0.52));
        let f = reference_formulation();
        engine.adjust(&f, 5590.0).unwrap();

        assert_eq!(f, reference_formulation());
    }
}
