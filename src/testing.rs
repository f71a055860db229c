//! Stub predictors, reference data and test functions useful for debugging,
//! benchmarking and smoke testing.
//!
//! The stubs stand in for the trained regression models. They are cheap,
//! deterministic and have a known optimum, so the strategies can be checked
//! against exact expectations.
//!
//! [`reference_formulation`] together with [`linear_viscosity`] and
//! [`constant`] solids is the recommended first setup.

#![allow(unused)]

use std::error::Error as StdError;

use nalgebra::{storage::Storage, DVector, Dyn, IsContiguous, Vector};
use thiserror::Error;

use crate::core::{Domain, Function, Optimizer, Problem};
use crate::features::FeatureVector;
use crate::formulation::{Formulation, Ingredient};
use crate::predictor::FnPredictor;

/// Reference formulation of a production batch.
///
/// | field                  | value   |
/// |------------------------|---------|
/// | `emulsion_a`           | 2066    |
/// | `emulsion_a_viscosity` | 3180    |
/// | `emulsion_a_solids`    | 0.5556  |
/// | `emulsion_f`           | 1240    |
/// | `emulsion_f_viscosity` | 4740    |
/// | `emulsion_f_solids`    | 0.6030  |
/// | `solution_e`           | 210     |
/// | `solution_f`           | 250     |
/// | `water`                | 75.6    |
/// | `other`                | 112.24  |
pub fn reference_formulation() -> Formulation {
    Formulation::new()
        .with(Ingredient::EmulsionA, 2066.0)
        .with(Ingredient::EmulsionAViscosity, 3180.0)
        .with(Ingredient::EmulsionASolids, 0.5556)
        .with(Ingredient::EmulsionF, 1240.0)
        .with(Ingredient::EmulsionFViscosity, 4740.0)
        .with(Ingredient::EmulsionFSolids, 0.6030)
        .with(Ingredient::SolutionE, 210.0)
        .with(Ingredient::SolutionF, 250.0)
        .with(Ingredient::Water, 75.6)
        .with(Ingredient::Other, 112.24)
}

/// Predictor returning the same value for any input.
pub fn constant(value: f64) -> FnPredictor<impl Fn(&FeatureVector<'_>) -> f64> {
    FnPredictor::new(move |_: &FeatureVector<'_>| value)
}

/// Viscosity predictor linear in the tuned variables.
///
/// ```text
/// v = 5000 + 10 (water - 75.6) - 5 (solution_e - 210)
/// ```
///
/// Adding water thickens and adding Solution E thins, which is the opposite
/// of what the stepping strategy assumes. Use [`diluting_viscosity`] for a
/// stub consistent with the stepping directions.
pub fn linear_viscosity() -> FnPredictor<impl Fn(&FeatureVector<'_>) -> f64> {
    FnPredictor::new(|features: &FeatureVector<'_>| {
        let water = features.get(Ingredient::Water).unwrap_or(0.0);
        let solution_e = features.get(Ingredient::SolutionE).unwrap_or(0.0);
        5000.0 + 10.0 * (water - 75.6) - 5.0 * (solution_e - 210.0)
    })
}

/// Viscosity predictor where water dilutes and Solution E thickens.
///
/// ```text
/// v = 5000 - 40 (water - 75.6) + 10 (solution_e - 210)
/// ```
pub fn diluting_viscosity() -> FnPredictor<impl Fn(&FeatureVector<'_>) -> f64> {
    FnPredictor::new(|features: &FeatureVector<'_>| {
        let water = features.get(Ingredient::Water).unwrap_or(0.0);
        let solution_e = features.get(Ingredient::SolutionE).unwrap_or(0.0);
        5000.0 - 40.0 * (water - 75.6) + 10.0 * (solution_e - 210.0)
    })
}

/// Solids predictor decreasing slowly with water, `0.55 - 0.0005 water`.
pub fn linear_solids() -> FnPredictor<impl Fn(&FeatureVector<'_>) -> f64> {
    FnPredictor::new(|features: &FeatureVector<'_>| {
        0.55 - 0.0005 * features.get(Ingredient::Water).unwrap_or(0.0)
    })
}

/// Paraboloid `(x0 - a)^2 + (x1 - b)^2` on a rectangular domain.
///
/// An optional barrier marks points as infeasible (positive infinity), the
/// same way the mass inequality is treated by the constrained objective.
pub struct Paraboloid {
    a: f64,
    b: f64,
    domain: Domain,
    barrier: Option<fn(f64, f64) -> bool>,
}

impl Paraboloid {
    /// Initializes the paraboloid with minimum at `(a, b)` on `[-10, 10]^2`.
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            a,
            b,
            domain: [(-10.0, 10.0), (-10.0, 10.0)].into_iter().collect(),
            barrier: None,
        }
    }

    /// Replaces the domain.
    pub fn with_domain<I: IntoIterator<Item = (f64, f64)>>(mut self, bounds: I) -> Self {
        self.domain = bounds.into_iter().collect();
        self
    }

    /// Sets the feasibility predicate.
    pub fn with_barrier(mut self, barrier: fn(f64, f64) -> bool) -> Self {
        self.barrier = Some(barrier);
        self
    }

    /// Checks whether given point is close to the unconstrained minimum.
    pub fn is_optimum<Sx>(&self, x: &Vector<f64, Dyn, Sx>, eps: f64) -> bool
    where
        Sx: Storage<f64, Dyn>,
    {
        (x[0] - self.a).abs() <= eps && (x[1] - self.b).abs() <= eps
    }
}

impl Problem for Paraboloid {
    fn domain(&self) -> Domain {
        self.domain.clone()
    }
}

impl Function for Paraboloid {
    fn apply<Sx>(&self, x: &Vector<f64, Dyn, Sx>) -> f64
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
    {
        match self.barrier {
            Some(feasible) if !feasible(x[0], x[1]) => f64::INFINITY,
            _ => (x[0] - self.a).powi(2) + (x[1] - self.b).powi(2),
        }
    }
}

/// A simple optimization loop for testing purposes.
///
/// Iterates until the function value is within tolerance from the known
/// minimum or the iteration limit is reached.
pub fn optimize<F: Function, O: Optimizer<F>>(
    f: &F,
    dom: &Domain,
    mut optimizer: O,
    mut x: DVector<f64>,
    min: f64,
    max_iters: usize,
    tolerance: f64,
) -> Result<DVector<f64>, TestingError<O::Error>>
where
    O::Error: StdError,
{
    let mut iter = 0;

    loop {
        let fx = optimizer.opt_next(f, dom, &mut x)?;

        if fx <= min + tolerance {
            // Converged.
            return Ok(x);
        }

        if iter == max_iters {
            return Err(TestingError::Termination);
        } else {
            iter += 1;
        }
    }
}

/// Error of the testing loop.
#[derive(Debug, Error)]
pub enum TestingError<E: StdError + 'static> {
    /// Error of the optimizer used.
    #[error("{0}")]
    Inner(#[from] E),
    /// Optimizer did not terminate.
    #[error("optimizer did not terminate")]
    Termination,
}
