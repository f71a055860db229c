#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

//! # Viscotune
//!
//! Tuning of water and Solution E in emulsion formulations so that the blend
//! reaches a target viscosity and stays within an acceptable solids content,
//! given fixed quantities of all other ingredients.
//!
//! The viscosity and the solids content are estimated by two regression
//! predictors trained offline. This library treats them as opaque functions
//! behind the [`Predictor`] trait and searches the two free variables with
//! one of four strategies.
//!
//! ## Strategies
//!
//! * [Stepping](algo::stepping) -- Fixed steps in the direction that closes
//!   the viscosity gap. The historical default, cheap and predictable.
//! * Warm-started stepping -- The same, starting from the closest historical
//!   batch (see [`warm_start`]).
//! * [Constrained](algo::nelder_mead) -- Bounded Nelder-Mead minimizing a
//!   band penalty while the batch must not get lighter than the original.
//! * [Stochastic](algo::particle_swarm) -- Particle swarm minimizing the band
//!   penalty with soft mass terms.
//!
//! ## Problem
//!
//! A [`Formulation`] maps every [`Ingredient`] to a non-negative value. Water
//! and Solution E are variable, everything else is fixed for the run. The
//! [`FeatureAssembler`] turns a formulation and candidate values into the
//! exact column order each predictor was trained on.
//!
//! The canonical viscosity schema has seven columns and includes Solution F
//! (`emulsion_a_viscosity, emulsion_f_viscosity, solution_e, solution_f,
//! water, emulsion_a_solids, emulsion_f_solids`), which is what the deployed
//! viscosity model was trained with. Models trained on different columns can
//! be used with a custom [`FeatureSchema`]; a model declaring its schema is
//! checked against the assembler before any search starts.
//!
//! ## Usage
//!
//! ```rust
//! use viscotune::{Engine, FnPredictor, Formulation, Ingredient};
//!
//! let viscosity = FnPredictor::new(|features| {
//!     let water = features.get(Ingredient::Water).unwrap_or(0.0);
//!     let solution_e = features.get(Ingredient::SolutionE).unwrap_or(0.0);
//!     5000.0 - 40.0 * (water - 75.6) + 10.0 * (solution_e - 210.0)
//! });
//! let solids = FnPredictor::new(|_| 0.52);
//!
//! let formulation = Formulation::new()
//!     .with(Ingredient::EmulsionA, 2066.0)
//!     .with(Ingredient::EmulsionAViscosity, 3180.0)
//!     .with(Ingredient::EmulsionASolids, 0.5556)
//!     .with(Ingredient::EmulsionF, 1240.0)
//!     .with(Ingredient::EmulsionFViscosity, 4740.0)
//!     .with(Ingredient::EmulsionFSolids, 0.6030)
//!     .with(Ingredient::SolutionE, 210.0)
//!     .with(Ingredient::SolutionF, 250.0)
//!     .with(Ingredient::Water, 75.6)
//!     .with(Ingredient::Other, 112.24);
//!
//! let engine = Engine::new(viscosity, solids);
//! let result = engine.adjust(&formulation, 5400.0)?;
//!
//! assert!(result.deviation() <= 200.0);
//! println!("{}", result);
//! # Ok::<(), viscotune::Error>(())
//! ```
//!
//! ## Logging
//!
//! The library logs through the [`log`](https://docs.rs/log) facade: run
//! start and finish on `info`, repaired starting points and results outside
//! the acceptance bands on `warn`, and per-iteration algorithm traces on
//! `debug`. No logger is installed by the library.
//!
//! ## Features
//!
//! * `serde` -- `Serialize`/`Deserialize` for the data types (formulations,
//!   schemas, linear models, historical datasets, targets) and `Serialize`
//!   for results.
//! * `testing` -- exports the [`testing`] module with stub predictors and the
//!   reference formulation.
//!
//! ## License
//!
//! Licensed under MIT.

pub mod algo;
mod core;
pub mod driver;
pub mod engine;
pub mod error;
pub mod features;
pub mod formulation;
pub mod predictor;
pub mod problem;
pub mod report;
pub mod scale;
pub mod warm_start;

pub use core::*;
pub use driver::OptimizerDriver;
pub use engine::{
    CancelToken, ConstrainedOptions, Engine, EngineBuilder, StochasticOptions, Strategy,
};
pub use error::{Error, FailureReason, Result, SchemaError, ValidationError};
pub use features::{FeatureAssembler, FeatureSchema, FeatureVector};
pub use formulation::{Formulation, Ingredient};
pub use predictor::{FnPredictor, LinearModel, Predictor};
pub use problem::TargetSpec;
pub use report::OptimizationResult;
pub use scale::{ProportionalScaler, Rounding};
pub use warm_start::{HistoricalDataset, HistoricalRecord};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
