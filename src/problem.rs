//! The tuning problem and its penalty objectives.
//!
//! [`TuningProblem`] binds one formulation snapshot, a target and both
//! predictors together. The continuous strategies minimize one of two
//! penalty objectives over (water, Solution E):
//!
//! * [`ConstrainedObjective`] keeps the batch mass from dropping below the
//!   original mass with a hard inequality (infeasible points evaluate to
//!   positive infinity).
//! * [`StochasticObjective`] replaces the hard inequality by a banded mass
//!   penalty and a closeness term (see [`StochasticObjective`] for the exact
//!   shape).

use std::cell::Cell;

use getset::CopyGetters;
use nalgebra::{storage::Storage, Dyn, IsContiguous, Vector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::core::{Domain, Function, Problem};
use crate::error::{Error, Result, ValidationError};
use crate::features::{BoundAssembler, FeatureAssembler};
use crate::formulation::Formulation;
use crate::predictor::{check_schema, Predictor};

/// Default acceptance band of the predicted viscosity.
pub const VISCOSITY_BAND: (f64, f64) = (4500.0, 5500.0);
/// Default acceptance band of the predicted solids fraction.
pub const SOLIDS_BAND: (f64, f64) = (0.50, 0.54);
/// Water bounds of the continuous strategies.
pub const WATER_BOUNDS: (f64, f64) = (10.0, 100.0);
/// Solution E bounds of the continuous strategies.
pub const SOLUTION_E_BOUNDS: (f64, f64) = (100.0, 300.0);

/// Relative slack tolerated on the mass inequality.
const MASS_TOLERANCE: f64 = 1e-9;

/// What the formulation should achieve.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[getset(get_copy = "pub")]
pub struct TargetSpec {
    /// Target viscosity.
    viscosity: f64,
    /// Acceptance band of the predicted viscosity. Default: `[4500, 5500]`.
    viscosity_band: (f64, f64),
    /// Acceptance band of the predicted solids fraction. Default:
    /// `[0.50, 0.54]`.
    solids_band: (f64, f64),
}

impl TargetSpec {
    /// Target with the default bands.
    pub fn new(viscosity: f64) -> Self {
        Self {
            viscosity,
            viscosity_band: VISCOSITY_BAND,
            solids_band: SOLIDS_BAND,
        }
    }

    /// Overrides the viscosity band.
    pub fn with_viscosity_band(mut self, lower: f64, upper: f64) -> Self {
        self.viscosity_band = (lower, upper);
        self
    }

    /// Overrides the solids band.
    pub fn with_solids_band(mut self, lower: f64, upper: f64) -> Self {
        self.solids_band = (lower, upper);
        self
    }

    /// Checks the target is positive and the bands are ordered.
    pub fn validate(&self) -> Result<()> {
        if !self.viscosity.is_finite() || self.viscosity <= 0.0 {
            return Err(ValidationError::Target(self.viscosity).into());
        }

        for (name, (lower, upper)) in [
            ("viscosity_band", self.viscosity_band),
            ("solids_band", self.solids_band),
        ] {
            if !(lower.is_finite() && upper.is_finite() && lower <= upper) {
                return Err(ValidationError::Option {
                    name,
                    reason: "band must be finite and ordered",
                }
                .into());
            }
        }

        Ok(())
    }

    /// Whether both predictions are inside their bands.
    pub fn accepts(&self, prediction: &Prediction) -> bool {
        band_penalty(prediction.viscosity, self.viscosity_band) == 0.0
            && band_penalty(prediction.solids, self.solids_band) == 0.0
    }
}

impl From<f64> for TargetSpec {
    fn from(viscosity: f64) -> Self {
        Self::new(viscosity)
    }
}

/// Output of both predictors for one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Predicted viscosity.
    pub viscosity: f64,
    /// Predicted solids fraction.
    pub solids: f64,
}

impl Prediction {
    /// Fails with [`Error::InvalidPrediction`] if either prediction is not a
    /// finite number.
    pub fn check(self) -> Result<Self> {
        if !self.viscosity.is_finite() {
            return Err(Error::InvalidPrediction {
                what: "viscosity",
                value: self.viscosity,
            });
        }

        if !self.solids.is_finite() {
            return Err(Error::InvalidPrediction {
                what: "solids",
                value: self.solids,
            });
        }

        Ok(self)
    }
}

/// Zero inside the band, distance to the nearest bound outside. NaN is
/// infinitely far from any band.
pub fn band_penalty(value: f64, (lower, upper): (f64, f64)) -> f64 {
    if value.is_nan() {
        f64::INFINITY
    } else if value < lower {
        lower - value
    } else if value > upper {
        value - upper
    } else {
        0.0
    }
}

/// One formulation snapshot bound to a target and a pair of predictors.
///
/// The problem is created per run and counts predictor evaluations.
pub struct TuningProblem<'a, V, S> {
    viscosity: &'a V,
    solids: &'a S,
    features: BoundAssembler<'a>,
    target: TargetSpec,
    fixed_mass: f64,
    initial: (f64, f64),
    evaluations: Cell<usize>,
}

impl<'a, V: Predictor, S: Predictor> TuningProblem<'a, V, S> {
    /// Validates the inputs and binds the formulation.
    pub fn new(
        viscosity: &'a V,
        solids: &'a S,
        assembler: &'a FeatureAssembler,
        formulation: &Formulation,
        target: TargetSpec,
    ) -> Result<Self> {
        formulation.validate()?;
        target.validate()?;

        check_schema("viscosity", viscosity, assembler.viscosity_schema())?;
        check_schema("solids", solids, assembler.solids_schema())?;

        let features = assembler.bind(formulation)?;
        let fixed_mass = formulation.fixed_mass()?;
        let initial = (formulation.water()?, formulation.solution_e()?);

        Ok(Self {
            viscosity,
            solids,
            features,
            target,
            fixed_mass,
            initial,
            evaluations: Cell::new(0),
        })
    }

    /// Calls both predictors for given water and Solution E.
    pub fn predict(&self, water: f64, solution_e: f64) -> Prediction {
        let (v, s) = self.features.fill(water, solution_e);
        self.evaluations.set(self.evaluations.get() + 1);

        Prediction {
            viscosity: self.viscosity.predict(&v),
            solids: self.solids.predict(&s),
        }
    }
}

impl<V, S> TuningProblem<'_, V, S> {
    /// The target.
    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    /// Water and Solution E of the formulation snapshot.
    pub fn initial(&self) -> (f64, f64) {
        self.initial
    }

    /// Batch mass of the original formulation.
    pub fn original_total(&self) -> f64 {
        self.total_mass(self.initial.0, self.initial.1)
    }

    /// Batch mass for given water and Solution E.
    pub fn total_mass(&self, water: f64, solution_e: f64) -> f64 {
        self.fixed_mass + water + solution_e
    }

    /// How many times the predictor pair was called.
    pub fn evaluations(&self) -> usize {
        self.evaluations.get()
    }

    /// Viscosity band, exact-target deviation and solids band penalties.
    pub fn base_penalty(&self, prediction: &Prediction) -> f64 {
        band_penalty(prediction.viscosity, self.target.viscosity_band())
            + (prediction.viscosity - self.target.viscosity()).abs()
            + band_penalty(prediction.solids, self.target.solids_band())
    }

    /// Whether given variables keep the batch at least as heavy as the
    /// original one.
    pub fn keeps_mass(&self, water: f64, solution_e: f64) -> bool {
        let (w0, e0) = self.initial;
        let slack = (water + solution_e) - (w0 + e0);
        slack >= -MASS_TOLERANCE * self.original_total().max(1.0)
    }
}

/// Domain of the continuous strategies, `[10, 100] x [100, 300]`.
pub fn continuous_domain() -> Domain {
    [WATER_BOUNDS, SOLUTION_E_BOUNDS].into_iter().collect()
}

/// Penalty objective with the hard mass inequality
/// `total - original_total >= 0`.
pub struct ConstrainedObjective<'p, 'a, V, S> {
    problem: &'p TuningProblem<'a, V, S>,
    domain: Domain,
}

impl<'p, 'a, V, S> ConstrainedObjective<'p, 'a, V, S> {
    /// Objective over the default continuous domain.
    pub fn new(problem: &'p TuningProblem<'a, V, S>) -> Self {
        Self::with_domain(problem, continuous_domain())
    }

    /// Objective over a custom domain.
    pub fn with_domain(problem: &'p TuningProblem<'a, V, S>, domain: Domain) -> Self {
        Self { problem, domain }
    }
}

impl<V, S> Problem for ConstrainedObjective<'_, '_, V, S> {
    fn domain(&self) -> Domain {
        self.domain.clone()
    }
}

impl<V: Predictor, S: Predictor> Function for ConstrainedObjective<'_, '_, V, S> {
    fn apply<Sx>(&self, x: &Vector<f64, Dyn, Sx>) -> f64
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
    {
        let (water, solution_e) = (x[0], x[1]);

        if !self.problem.keeps_mass(water, solution_e) {
            return f64::INFINITY;
        }

        let prediction = self.problem.predict(water, solution_e);
        self.problem.base_penalty(&prediction)
    }
}

/// Default weight of the closeness term of [`StochasticObjective`].
pub const DEFAULT_CLOSENESS_WEIGHT: f64 = 1.0;
/// Width of the tolerated mass band above the original mass.
pub const MASS_BAND_WIDTH: f64 = 50.0;
/// Penalty per unit of mass outside the tolerated band.
pub const MASS_PENALTY_FACTOR: f64 = 10.0;

/// Penalty objective with soft mass terms.
///
/// On top of the [base penalty](TuningProblem::base_penalty) it adds
///
/// * `10 x distance` when the total mass leaves
///   `[original_total, original_total + 50]`, and
/// * `closeness_weight x (total - original_total)`, signed and applied
///   regardless of the band.
///
/// The closeness term overlaps with the banded term and makes the attainable
/// minimum strictly positive whenever the total differs from the original
/// total. The default weight ([`DEFAULT_CLOSENESS_WEIGHT`]) keeps that
/// historical behavior; a weight of zero leaves only the banded term.
pub struct StochasticObjective<'p, 'a, V, S> {
    problem: &'p TuningProblem<'a, V, S>,
    domain: Domain,
    closeness_weight: f64,
}

impl<'p, 'a, V, S> StochasticObjective<'p, 'a, V, S> {
    /// Objective over the default continuous domain with given closeness
    /// weight.
    pub fn new(problem: &'p TuningProblem<'a, V, S>, closeness_weight: f64) -> Self {
        Self {
            problem,
            domain: continuous_domain(),
            closeness_weight,
        }
    }

    /// Mass terms for given total mass.
    pub fn mass_penalty(&self, total: f64) -> f64 {
        let original = self.problem.original_total();
        let banded = band_penalty(total, (original, original + MASS_BAND_WIDTH));

        MASS_PENALTY_FACTOR * banded + self.closeness_weight * (total - original)
    }
}

impl<V, S> Problem for StochasticObjective<'_, '_, V, S> {
    fn domain(&self) -> Domain {
        self.domain.clone()
    }
}

impl<V: Predictor, S: Predictor> Function for StochasticObjective<'_, '_, V, S> {
    fn apply<Sx>(&self, x: &Vector<f64, Dyn, Sx>) -> f64
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
    {
        let (water, solution_e) = (x[0], x[1]);

        let prediction = self.problem.predict(water, solution_e);
        let total = self.problem.total_mass(water, solution_e);

        self.problem.base_penalty(&prediction) + self.mass_penalty(total)
    }
}
