//! Error taxonomy of the tuning engine.
//!
//! Errors caused by the caller's input ([`ValidationError`], [`SchemaError`],
//! [`Error::EmptyDataset`], [`Error::Division`]) are kept apart from a search
//! that did not succeed ([`Error::OptimizationFailure`]) and from runs that
//! were interrupted from outside.

use thiserror::Error;

use crate::formulation::Ingredient;

/// Result type with the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned from the tuning engine and its building blocks.
#[derive(Debug, Error)]
pub enum Error {
    /// An input value is outside of its declared physical bounds.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    /// A feature is missing or the columns do not match what a predictor was
    /// trained on.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    /// The search did not produce an acceptable formulation.
    #[error("optimization failed: {0}")]
    OptimizationFailure(#[from] FailureReason),
    /// Warm-start lookup without any historical record.
    #[error("historical dataset is empty")]
    EmptyDataset,
    /// Proportional scaling of ingredients with zero total.
    #[error("cannot scale ingredients with zero total")]
    Division,
    /// A predictor returned a value which is not a finite number.
    #[error("{what} predictor returned non-finite value {value}")]
    InvalidPrediction {
        /// Which predictor misbehaved.
        what: &'static str,
        /// The returned value.
        value: f64,
    },
    /// The run was cancelled through its [`CancelToken`](crate::CancelToken).
    #[error("run was cancelled")]
    Cancelled,
    /// The run did not finish before its deadline.
    #[error("run exceeded its deadline")]
    DeadlineExceeded,
}

impl Error {
    /// Whether the error was caused by the input rather than by the search.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Schema(_) | Error::EmptyDataset | Error::Division
        )
    }
}

/// Input value outside of the declared physical bounds.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Ingredient amounts and properties can never be negative.
    #[error("{ingredient} must not be negative, got {value}")]
    Negative {
        /// Offending ingredient.
        ingredient: Ingredient,
        /// Its value.
        value: f64,
    },
    /// NaN or infinity.
    #[error("{ingredient} must be a finite number, got {value}")]
    NonFinite {
        /// Offending ingredient.
        ingredient: Ingredient,
        /// Its value.
        value: f64,
    },
    /// A tuned variable left its allowed range during the search.
    #[error("{ingredient} = {value} left the allowed range [{min}, {max}]")]
    OutOfRange {
        /// Offending ingredient.
        ingredient: Ingredient,
        /// Its value.
        value: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Target viscosity must be positive and finite.
    #[error("target viscosity must be positive, got {0}")]
    Target(f64),
    /// Requested batch size must be a non-negative finite number.
    #[error("requested total must be a non-negative number, got {0}")]
    RequestedTotal(f64),
    /// Batch size being scaled must be a non-negative finite number.
    #[error("fixed total must be a non-negative number, got {0}")]
    FixedTotal(f64),
    /// An option of a strategy has a value the strategy cannot work with.
    #[error("invalid option {name}: {reason}")]
    Option {
        /// Option name.
        name: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Missing or misordered feature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The formulation lacks a field required by a schema.
    #[error("missing field {0}")]
    Missing(Ingredient),
    /// A schema lists the same column twice.
    #[error("duplicate column {0}")]
    Duplicate(Ingredient),
    /// A schema has no columns.
    #[error("schema has no columns")]
    Empty,
    /// A predictor declares different columns (or order) than it is fed.
    #[error("{what} predictor expects columns [{expected}], assembler provides [{found}]")]
    Mismatch {
        /// Which predictor.
        what: &'static str,
        /// Columns declared by the predictor.
        expected: String,
        /// Columns produced by the assembler.
        found: String,
    },
    /// Vector lengths differ.
    #[error("expected {expected} values, got {found}")]
    Length {
        /// Required length.
        expected: usize,
        /// Actual length.
        found: usize,
    },
}

/// Reason why a search failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureReason {
    /// Stepping search ran out of iterations before reaching the tolerance.
    #[error("target not reached within {0} iterations")]
    MaxIterations(usize),
    /// Continuous solver ran out of iterations before convergence.
    #[error("solver did not converge within {0} iterations")]
    NotConverged(usize),
    /// No point satisfying the constraints could be found.
    #[error("no feasible formulation: {0}")]
    Infeasible(&'static str),
    /// Simplex of the constrained solver is degenerate.
    #[error("simplex contains too many invalid values")]
    InvalidSimplex,
    /// Every candidate of the population evaluated to an invalid value.
    #[error("no candidate with a finite objective")]
    NoValidCandidate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_distinguished() {
        let err = Error::from(ValidationError::Target(-1.0));
        assert!(err.is_input_error());

        let err = Error::from(SchemaError::Missing(Ingredient::Water));
        assert!(err.is_input_error());

        let err = Error::from(FailureReason::MaxIterations(10));
        assert!(!err.is_input_error());
        assert!(!Error::Cancelled.is_input_error());
    }

    #[test]
    fn messages_name_the_ingredient() {
        let err = Error::from(ValidationError::OutOfRange {
            ingredient: Ingredient::Water,
            value: 101.0,
            min: 0.0,
            max: 100.0,
        });

        assert_eq!(
            err.to_string(),
            "invalid input: water = 101 left the allowed range [0, 100]"
        );
    }
}
