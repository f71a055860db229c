//! Iterative stepping adjuster.
//!
//! The oldest and simplest strategy: predict the viscosity for the current
//! water and Solution E, and if it misses the target by more than the
//! tolerance, move both variables by a fixed step in the direction that
//! should close the gap. Too viscous means dilute (more water, less
//! Solution E), too thin means thicken (less water, more Solution E).
//!
//! The method does not steer by the solids prediction, it only reports it
//! (and rejects it when not finite). It neither guarantees convergence nor optimality, therefore the number
//! of steps is capped by [`max_iterations`](SteppingOptions::max_iterations).

use getset::{CopyGetters, Setters};
use log::debug;

use crate::error::{Error, Result, ValidationError};
use crate::formulation::Ingredient;
use crate::predictor::Predictor;
use crate::problem::{Prediction, TuningProblem};

/// Options for [`Stepping`] adjuster.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct SteppingOptions {
    /// Accepted absolute viscosity deviation. Default: `200`.
    tolerance: f64,
    /// Maximum number of predictions before giving up. Default: `1000`.
    max_iterations: usize,
    /// Allowed water range. Default: `[0, 100]`.
    water_bounds: (f64, f64),
    /// Allowed Solution E range. Default: `[0, 300]`.
    solution_e_bounds: (f64, f64),
    /// Water change when the blend is too viscous. Default: `1`.
    dilute_water_step: f64,
    /// Solution E change when the blend is too viscous. Default: `-0.5`.
    dilute_solution_e_step: f64,
    /// Water change when the blend is too thin. Default: `-1`.
    thicken_water_step: f64,
    /// Solution E change when the blend is too thin. Default: `1`.
    thicken_solution_e_step: f64,
}

impl Default for SteppingOptions {
    fn default() -> Self {
        Self {
            tolerance: 200.0,
            max_iterations: 1000,
            water_bounds: (0.0, 100.0),
            solution_e_bounds: (0.0, 300.0),
            dilute_water_step: 1.0,
            dilute_solution_e_step: -0.5,
            thicken_water_step: -1.0,
            thicken_solution_e_step: 1.0,
        }
    }
}

impl SteppingOptions {
    /// Checks that the options describe a usable search.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(option("tolerance", "must be a non-negative number"));
        }

        if self.max_iterations == 0 {
            return Err(option("max_iterations", "must be positive"));
        }

        if !is_range(self.water_bounds) {
            return Err(option("water_bounds", "must be finite and ordered"));
        }

        if !is_range(self.solution_e_bounds) {
            return Err(option("solution_e_bounds", "must be finite and ordered"));
        }

        let steps = [
            self.dilute_water_step,
            self.dilute_solution_e_step,
            self.thicken_water_step,
            self.thicken_solution_e_step,
        ];

        if steps.iter().any(|step| !step.is_finite()) {
            return Err(option("step", "must be finite"));
        }

        Ok(())
    }
}

fn option(name: &'static str, reason: &'static str) -> Error {
    ValidationError::Option { name, reason }.into()
}

fn is_range((lower, upper): (f64, f64)) -> bool {
    lower.is_finite() && upper.is_finite() && lower <= upper
}

/// Outcome of one [`Stepping::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// The prediction is within tolerance, the variables were left as they
    /// are.
    Converged(Prediction),
    /// The variables were moved.
    Moved {
        /// Prediction before the move.
        prediction: Prediction,
        /// Predicted minus target viscosity.
        delta: f64,
    },
}

/// Stepping adjuster.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone)]
pub struct Stepping {
    options: SteppingOptions,
    iterations: usize,
}

impl Stepping {
    /// Initializes the adjuster with default options.
    pub fn new() -> Self {
        Self::with_options(SteppingOptions::default())
    }

    /// Initializes the adjuster with given options.
    pub fn with_options(options: SteppingOptions) -> Self {
        Self {
            options,
            iterations: 0,
        }
    }

    /// The options.
    pub fn options(&self) -> &SteppingOptions {
        &self.options
    }

    /// Number of steps done so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Resets the step counter.
    pub fn reset(&mut self) {
        self.iterations = 0;
    }

    /// Fails with [`ValidationError::OutOfRange`] if water or Solution E is
    /// outside its allowed range.
    pub fn check_bounds(&self, (water, solution_e): (f64, f64)) -> Result<()> {
        check_range(Ingredient::Water, water, self.options.water_bounds)?;
        check_range(
            Ingredient::SolutionE,
            solution_e,
            self.options.solution_e_bounds,
        )
    }

    /// Does one step from given water and Solution E.
    ///
    /// The variables are validated against their bounds *before* the
    /// prediction, so a move that left the allowed range is reported on the
    /// following call.
    pub fn step<V, S>(&mut self, problem: &TuningProblem<'_, V, S>, x: &mut (f64, f64)) -> Result<Step>
    where
        V: Predictor,
        S: Predictor,
    {
        let SteppingOptions {
            tolerance,
            dilute_water_step,
            dilute_solution_e_step,
            thicken_water_step,
            thicken_solution_e_step,
            ..
        } = self.options;

        self.check_bounds(*x)?;
        let (water, solution_e) = *x;

        let prediction = problem.predict(water, solution_e);
        self.iterations += 1;
        let prediction = prediction.check()?;

        let delta = prediction.viscosity - problem.target().viscosity();

        debug!(
            "step {}: water = {}, solution_e = {}, viscosity = {}, delta = {}",
            self.iterations, water, solution_e, prediction.viscosity, delta
        );

        if delta.abs() <= tolerance {
            return Ok(Step::Converged(prediction));
        }

        if delta > 0.0 {
            x.0 += dilute_water_step;
            x.1 += dilute_solution_e_step;
        } else {
            x.0 += thicken_water_step;
            x.1 += thicken_solution_e_step;
        }

        Ok(Step::Moved { prediction, delta })
    }
}

impl Default for Stepping {
    fn default() -> Self {
        Self::new()
    }
}

fn check_range(ingredient: Ingredient, value: f64, (min, max): (f64, f64)) -> Result<()> {
    // Negated comparison also rejects NaN.
    if !(min <= value && value <= max) {
        return Err(ValidationError::OutOfRange {
            ingredient,
            value,
            min,
            max,
        }
        .into());
    }

    Ok(())
}
