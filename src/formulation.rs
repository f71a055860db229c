//! Formulation data model.
//!
//! A [`Formulation`] maps every [`Ingredient`] to a non-negative amount or
//! property. Water and Solution E are the only *variable* fields, owned by
//! the search while it runs. Everything else is fixed by the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::iter::FromIterator;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError, ValidationError};

/// Key of a formulation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Ingredient {
    /// Amount of primary emulsion A.
    EmulsionA,
    /// Viscosity of emulsion A.
    EmulsionAViscosity,
    /// Solids fraction of emulsion A.
    EmulsionASolids,
    /// Amount of primary emulsion F.
    EmulsionF,
    /// Viscosity of emulsion F.
    EmulsionFViscosity,
    /// Solids fraction of emulsion F.
    EmulsionFSolids,
    /// Amount of aqueous Solution E (variable).
    SolutionE,
    /// Amount of aqueous Solution F.
    SolutionF,
    /// Amount of water (variable).
    Water,
    /// Amount of miscellaneous ingredients.
    Other,
}

impl Ingredient {
    /// All ingredients in declaration order.
    pub const ALL: [Ingredient; 10] = [
        Ingredient::EmulsionA,
        Ingredient::EmulsionAViscosity,
        Ingredient::EmulsionASolids,
        Ingredient::EmulsionF,
        Ingredient::EmulsionFViscosity,
        Ingredient::EmulsionFSolids,
        Ingredient::SolutionE,
        Ingredient::SolutionF,
        Ingredient::Water,
        Ingredient::Other,
    ];

    /// Ingredients contributing to the batch mass.
    pub const AMOUNTS: [Ingredient; 6] = [
        Ingredient::EmulsionA,
        Ingredient::EmulsionF,
        Ingredient::Water,
        Ingredient::SolutionE,
        Ingredient::SolutionF,
        Ingredient::Other,
    ];

    /// Ingredients the caller fixes for a run.
    pub const FIXED: [Ingredient; 8] = [
        Ingredient::EmulsionA,
        Ingredient::EmulsionAViscosity,
        Ingredient::EmulsionASolids,
        Ingredient::EmulsionF,
        Ingredient::EmulsionFViscosity,
        Ingredient::EmulsionFSolids,
        Ingredient::SolutionF,
        Ingredient::Other,
    ];

    /// Stable name used in logs and messages.
    pub fn name(&self) -> &'static str {
        match self {
            Ingredient::EmulsionA => "emulsion_a",
            Ingredient::EmulsionAViscosity => "emulsion_a_viscosity",
            Ingredient::EmulsionASolids => "emulsion_a_solids",
            Ingredient::EmulsionF => "emulsion_f",
            Ingredient::EmulsionFViscosity => "emulsion_f_viscosity",
            Ingredient::EmulsionFSolids => "emulsion_f_solids",
            Ingredient::SolutionE => "solution_e",
            Ingredient::SolutionF => "solution_f",
            Ingredient::Water => "water",
            Ingredient::Other => "other",
        }
    }

    /// Whether the search owns this field.
    pub fn is_variable(&self) -> bool {
        matches!(self, Ingredient::Water | Ingredient::SolutionE)
    }

    /// Whether the field is an amount contributing to the batch mass.
    pub fn is_amount(&self) -> bool {
        Self::AMOUNTS.contains(self)
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of a formulation.
///
/// The engine never mutates a formulation it was given. New values of the
/// tuned variables always produce a new snapshot through
/// [`with_variables`](Formulation::with_variables).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Formulation {
    values: BTreeMap<Ingredient, f64>,
}

impl Formulation {
    /// Creates an empty formulation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the formulation with given field set.
    pub fn with(mut self, ingredient: Ingredient, value: f64) -> Self {
        self.values.insert(ingredient, value);
        self
    }

    /// Sets given field.
    pub fn set(&mut self, ingredient: Ingredient, value: f64) {
        self.values.insert(ingredient, value);
    }

    /// Gets the value of a field.
    pub fn get(&self, ingredient: Ingredient) -> Result<f64> {
        self.values
            .get(&ingredient)
            .copied()
            .ok_or_else(|| SchemaError::Missing(ingredient).into())
    }

    /// Gets the value of a field if present.
    pub fn value(&self, ingredient: Ingredient) -> Option<f64> {
        self.values.get(&ingredient).copied()
    }

    /// Current water amount.
    pub fn water(&self) -> Result<f64> {
        self.get(Ingredient::Water)
    }

    /// Current Solution E amount.
    pub fn solution_e(&self) -> Result<f64> {
        self.get(Ingredient::SolutionE)
    }

    /// Returns a new snapshot with the tuned variables replaced.
    pub fn with_variables(&self, water: f64, solution_e: f64) -> Self {
        self.clone()
            .with(Ingredient::Water, water)
            .with(Ingredient::SolutionE, solution_e)
    }

    /// Iterates the fields in the [`Ingredient`] declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Ingredient, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    /// Checks that every present field is a non-negative finite number.
    pub fn validate(&self) -> Result<()> {
        for (ingredient, value) in self.iter() {
            if !value.is_finite() {
                return Err(ValidationError::NonFinite { ingredient, value }.into());
            }

            if value < 0.0 {
                return Err(ValidationError::Negative { ingredient, value }.into());
            }
        }

        Ok(())
    }

    /// Sum of fixed amounts, i.e. the batch mass without water and
    /// Solution E.
    pub fn fixed_mass(&self) -> Result<f64> {
        Ingredient::AMOUNTS
            .iter()
            .filter(|ingredient| !ingredient.is_variable())
            .map(|ingredient| self.get(*ingredient))
            .sum()
    }

    /// Total batch mass:
    /// `emulsion_a + emulsion_f + water + solution_e + solution_f + other`.
    pub fn total_mass(&self) -> Result<f64> {
        Ok(self.fixed_mass()? + self.water()? + self.solution_e()?)
    }
}

impl FromIterator<(Ingredient, f64)> for Formulation {
    fn from_iter<I: IntoIterator<Item = (Ingredient, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
