//! Proportional scaling of a formulation to a requested batch size.
//!
//! Every amount in the plan is multiplied by `requested_total / fixed_total`
//! and rounded the way the plant weighs it: whole units for the bulk
//! ingredients, two decimals for water and the minor ingredients. Properties
//! (viscosities, solids fractions) do not depend on the batch size and are
//! passed through.

use std::collections::BTreeMap;

use crate::error::{Error, Result, ValidationError};
use crate::formulation::{Formulation, Ingredient};

/// How a scaled amount is rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round to the nearest whole number.
    Integer,
    /// Round to given number of decimal places.
    Decimals(u32),
    /// Keep full precision.
    Exact,
}

impl Rounding {
    /// Rounds the value, halves away from zero.
    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            Rounding::Integer => value.round(),
            Rounding::Decimals(places) => {
                let factor = 10f64.powi(places as i32);
                (value * factor).round() / factor
            }
            Rounding::Exact => value,
        }
    }
}

/// Scales formulations proportionally.
#[derive(Debug, Clone, PartialEq)]
pub struct ProportionalScaler {
    plan: BTreeMap<Ingredient, Rounding>,
}

impl Default for ProportionalScaler {
    fn default() -> Self {
        Self::with_plan([
            (Ingredient::EmulsionA, Rounding::Integer),
            (Ingredient::EmulsionF, Rounding::Integer),
            (Ingredient::SolutionE, Rounding::Integer),
            (Ingredient::SolutionF, Rounding::Integer),
            (Ingredient::Water, Rounding::Decimals(2)),
            (Ingredient::Other, Rounding::Decimals(2)),
        ])
    }
}

impl ProportionalScaler {
    /// Scaler with custom plan.
    pub fn with_plan<I: IntoIterator<Item = (Ingredient, Rounding)>>(plan: I) -> Self {
        Self {
            plan: plan.into_iter().collect(),
        }
    }

    /// Rounding of given ingredient, `None` if it is not scaled.
    pub fn rounding(&self, ingredient: Ingredient) -> Option<Rounding> {
        self.plan.get(&ingredient).copied()
    }

    /// Scales the planned fields of the formulation by
    /// `requested_total / fixed_total`.
    ///
    /// Planned fields missing in the formulation are skipped. The formulation
    /// must be valid (see [`Formulation::validate`]).
    pub fn scale(
        &self,
        formulation: &Formulation,
        fixed_total: f64,
        requested_total: f64,
    ) -> Result<Formulation> {
        formulation.validate()?;

        if !(requested_total.is_finite() && requested_total >= 0.0) {
            return Err(ValidationError::RequestedTotal(requested_total).into());
        }

        if !(fixed_total.is_finite() && fixed_total >= 0.0) {
            return Err(ValidationError::FixedTotal(fixed_total).into());
        }

        if fixed_total == 0.0 {
            return Err(Error::Division);
        }

        let factor = requested_total / fixed_total;

        Ok(formulation
            .iter()
            .map(|(ingredient, value)| match self.rounding(ingredient) {
                Some(rounding) => (ingredient, rounding.apply(value * factor)),
                None => (ingredient, value),
            })
            .collect())
    }

    /// Scales the formulation so that its planned fields sum up to the
    /// requested total (up to rounding).
    pub fn scale_to(&self, formulation: &Formulation, requested_total: f64) -> Result<Formulation> {
        let fixed_total = formulation
            .iter()
            .filter(|(ingredient, _)| self.plan.contains_key(ingredient))
            .map(|(_, value)| value)
            .sum();

        self.scale(formulation, fixed_total, requested_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::testing::reference_formulation;

    #[test]
    fn rounding() {
        assert_eq!(Rounding::Integer.apply(2.5), 3.0);
        assert_eq!(Rounding::Integer.apply(2.4), 2.0);
        assert_relative_eq!(Rounding::Decimals(2).apply(75.6049), 75.6);
        assert_relative_eq!(Rounding::Decimals(2).apply(1.005001), 1.01);
        assert_eq!(Rounding::Exact.apply(0.123456), 0.123456);
    }

    #[test]
    fn identity() {
        let f = reference_formulation();
        let scaled = ProportionalScaler::default().scale(&f, 100.0, 100.0).unwrap();

        assert_eq!(scaled, f);
    }

    #[test]
    fn doubling() {
        let f = reference_formulation();
        let scaled = ProportionalScaler::default().scale(&f, 1.0, 2.0).unwrap();

        assert_eq!(scaled.get(Ingredient::EmulsionA).unwrap(), 4132.0);
        assert_eq!(scaled.get(Ingredient::SolutionF).unwrap(), 500.0);
        assert_relative_eq!(scaled.get(Ingredient::Water).unwrap(), 151.2);
        assert_relative_eq!(scaled.get(Ingredient::Other).unwrap(), 224.48);
        // Properties are not amounts.
        assert_eq!(scaled.get(Ingredient::EmulsionAViscosity).unwrap(), 3180.0);
        assert_eq!(scaled.get(Ingredient::EmulsionFSolids).unwrap(), 0.6030);
    }

    #[test]
    fn integer_rounding_of_bulk() {
        let f = reference_formulation();
        let scaled = ProportionalScaler::default().scale(&f, 3.0, 1.0).unwrap();

        // 2066 / 3 = 688.67
        assert_eq!(scaled.get(Ingredient::EmulsionA).unwrap(), 689.0);
        // 75.6 / 3 = 25.2
        assert_relative_eq!(scaled.get(Ingredient::Water).unwrap(), 25.2);
        // 112.24 / 3 = 37.4133
        assert_relative_eq!(scaled.get(Ingredient::Other).unwrap(), 37.41);
    }

    #[test]
    fn scale_to_requested_total() {
        let f = reference_formulation();
        let total = f.total_mass().unwrap();
        let scaled = ProportionalScaler::default()
            .scale_to(&f, 2.0 * total)
            .unwrap();

        assert_relative_eq!(scaled.total_mass().unwrap(), 2.0 * total, epsilon = 1.0);
    }

    #[test]
    fn division_by_zero() {
        let f = reference_formulation();
        assert!(matches!(
            ProportionalScaler::default().scale(&f, 0.0, 100.0),
            Err(Error::Division)
        ));
    }

    #[test]
    fn invalid_requested_total() {
        let f = reference_formulation();
        assert!(matches!(
            ProportionalScaler::default().scale(&f, 1.0, -5.0),
            Err(Error::Validation(ValidationError::RequestedTotal(_)))
        ));
        assert!(matches!(
            ProportionalScaler::default().scale(&f, 1.0, f64::NAN),
            Err(Error::Validation(ValidationError::RequestedTotal(_)))
        ));
        assert_eq!(
            ProportionalScaler::default()
                .scale(&f, 1.0, 0.0)
                .unwrap()
                .get(Ingredient::EmulsionA)
                .unwrap(),
            0.0
        );
    }

    #[test]
    fn invalid_fixed_total() {
        let f = reference_formulation();
        for fixed_total in [-10.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                ProportionalScaler::default().scale(&f, fixed_total, 100.0),
                Err(Error::Validation(ValidationError::FixedTotal(_)))
            ));
        }
    }

    #[test]
    fn invalid_formulation() {
        let f = reference_formulation().with(Ingredient::Other, -1.0);
        assert!(matches!(
            ProportionalScaler::default().scale_to(&f, 100.0),
            Err(Error::Validation(ValidationError::Negative {
                ingredient: Ingredient::Other,
                ..
            }))
        ));
    }
}
