//! Result of a tuning run and its plain-text rendering.

use std::fmt;

use getset::CopyGetters;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::formulation::Formulation;
use crate::problem::{Prediction, TargetSpec, TuningProblem};

/// Outcome of a successful run.
///
/// Created once by the engine and read-only afterwards.
#[derive(Debug, Clone, PartialEq, CopyGetters)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[getset(get_copy = "pub")]
pub struct OptimizationResult {
    /// Optimized water.
    water: f64,
    /// Optimized Solution E.
    solution_e: f64,
    /// Predicted viscosity at the optimized values.
    viscosity: f64,
    /// Predicted solids fraction at the optimized values.
    solids: f64,
    /// Total batch mass recomputed from the mass formula.
    total_mass: f64,
    /// Absolute deviation of the predicted viscosity from the target.
    deviation: f64,
    /// `deviation / target * 100`.
    relative_error: f64,
    /// Name of the strategy which produced the result.
    strategy: &'static str,
    /// Number of iterations performed.
    iterations: usize,
    /// Number of predictor evaluations.
    evaluations: usize,
    /// Whether both predictions lie in their acceptance bands.
    feasible: bool,
}

impl OptimizationResult {
    pub(crate) fn new<V, S>(
        problem: &TuningProblem<'_, V, S>,
        (water, solution_e): (f64, f64),
        prediction: Prediction,
        strategy: &'static str,
        iterations: usize,
    ) -> Self {
        let target: &TargetSpec = problem.target();
        let deviation = (prediction.viscosity - target.viscosity()).abs();

        Self {
            water,
            solution_e,
            viscosity: prediction.viscosity,
            solids: prediction.solids,
            total_mass: problem.total_mass(water, solution_e),
            deviation,
            relative_error: deviation / target.viscosity() * 100.0,
            strategy,
            iterations,
            evaluations: problem.evaluations(),
            feasible: target.accepts(&prediction),
        }
    }

    /// The formulation with the optimized values applied.
    pub fn apply_to(&self, formulation: &Formulation) -> Formulation {
        formulation.with_variables(self.water, self.solution_e)
    }
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "strategy:            {}", self.strategy)?;
        writeln!(f, "water:               {:.2}", self.water)?;
        writeln!(f, "solution E:          {:.2}", self.solution_e)?;
        writeln!(f, "predicted viscosity: {:.2}", self.viscosity)?;
        writeln!(f, "predicted solids:    {:.2} %", self.solids * 100.0)?;
        writeln!(f, "total mass:          {:.2}", self.total_mass)?;
        writeln!(f, "deviation:           {:.2}", self.deviation)?;
        writeln!(f, "relative error:      {:.2} %", self.relative_error)?;
        write!(
            f,
            "iterations:          {} ({} evaluations){}",
            self.iterations,
            self.evaluations,
            if self.feasible { "" } else { ", outside acceptance bands" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::features::FeatureAssembler;
    use crate::testing::*;

    #[test]
    fn derived_values() {
        let assembler = FeatureAssembler::default();
        let v = constant(5100.0);
        let s = constant(0.52);
        let problem = TuningProblem::new(
            &v,
            &s,
            &assembler,
            &reference_formulation(),
            TargetSpec::new(5000.0),
        )
        .unwrap();

        let prediction = problem.predict(80.0, 200.0);
        let result = OptimizationResult::new(&problem, (80.0, 200.0), prediction, "stepping", 3);

        assert_relative_eq!(result.deviation(), 100.0);
        assert_relative_eq!(result.relative_error(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(
            result.total_mass(),
            2066.0 + 1240.0 + 250.0 + 112.24 + 80.0 + 200.0,
            epsilon = 1e-9
        );
        assert_eq!(result.evaluations(), 1);
        assert!(result.feasible());

        let f = result.apply_to(&reference_formulation());
        assert_eq!(f.water().unwrap(), 80.0);
    }

    #[test]
    fn display() {
        let assembler = FeatureAssembler::default();
        let v = constant(5000.0);
        let s = constant(0.60);
        let problem = TuningProblem::new(
            &v,
            &s,
            &assembler,
            &reference_formulation(),
            TargetSpec::new(5000.0),
        )
        .unwrap();

        let prediction = problem.predict(75.6, 210.0);
        let result = OptimizationResult::new(&problem, (75.6, 210.0), prediction, "stepping", 1);
        let text = result.to_string();

        assert!(text.contains("water:               75.60"));
        assert!(text.contains("predicted solids:    60.00 %"));
        assert!(text.contains("relative error:      0.00 %"));
        assert!(text.ends_with("outside acceptance bands"));
    }
}
