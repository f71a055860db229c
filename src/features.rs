//! Feature assembly for the predictors.
//!
//! Each predictor was trained on a fixed, ordered subset of the formulation
//! fields. Feeding the columns in any other order silently produces wrong
//! predictions, therefore a [`FeatureSchema`] is an exact-match contract and
//! the [`FeatureAssembler`] is the only place that turns a formulation into
//! predictor input.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::formulation::{Formulation, Ingredient};

/// Ordered, duplicate-free list of columns a predictor consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<Ingredient>", into = "Vec<Ingredient>"))]
pub struct FeatureSchema {
    columns: Vec<Ingredient>,
}

impl FeatureSchema {
    /// Creates a schema from given columns.
    pub fn new(columns: Vec<Ingredient>) -> Result<Self> {
        if columns.is_empty() {
            return Err(SchemaError::Empty.into());
        }

        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(SchemaError::Duplicate(*column).into());
            }
        }

        Ok(Self { columns })
    }

    /// Input columns of the viscosity predictor.
    ///
    /// Solution F is part of the schema, see the crate documentation for the
    /// reasoning.
    pub fn viscosity() -> Self {
        Self {
            columns: vec![
                Ingredient::EmulsionAViscosity,
                Ingredient::EmulsionFViscosity,
                Ingredient::SolutionE,
                Ingredient::SolutionF,
                Ingredient::Water,
                Ingredient::EmulsionASolids,
                Ingredient::EmulsionFSolids,
            ],
        }
    }

    /// Input columns of the solids predictor.
    pub fn solids() -> Self {
        Self {
            columns: vec![
                Ingredient::EmulsionASolids,
                Ingredient::EmulsionFSolids,
                Ingredient::Water,
                Ingredient::EmulsionAViscosity,
                Ingredient::SolutionE,
                Ingredient::EmulsionFViscosity,
            ],
        }
    }

    /// Columns in order.
    pub fn columns(&self) -> &[Ingredient] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always `false`, a schema cannot be empty.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column.
    pub fn position(&self, ingredient: Ingredient) -> Option<usize> {
        self.columns.iter().position(|c| *c == ingredient)
    }
}

impl fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", column)?;
        }
        Ok(())
    }
}

impl TryFrom<Vec<Ingredient>> for FeatureSchema {
    type Error = SchemaError;

    fn try_from(columns: Vec<Ingredient>) -> std::result::Result<Self, Self::Error> {
        Self::new(columns).map_err(|error| match error {
            crate::Error::Schema(error) => error,
            _ => SchemaError::Empty,
        })
    }
}

impl From<FeatureSchema> for Vec<Ingredient> {
    fn from(schema: FeatureSchema) -> Self {
        schema.columns
    }
}

/// Predictor input: values in exactly the order of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector<'s> {
    schema: &'s FeatureSchema,
    values: Vec<f64>,
}

impl<'s> FeatureVector<'s> {
    /// The schema the values follow.
    pub fn schema(&self) -> &'s FeatureSchema {
        self.schema
    }

    /// Values in schema order.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Value of a column by name.
    pub fn get(&self, ingredient: Ingredient) -> Option<f64> {
        self.schema.position(ingredient).map(|i| self.values[i])
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds predictor inputs from a formulation and candidate variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureAssembler {
    viscosity: FeatureSchema,
    solids: FeatureSchema,
}

impl Default for FeatureAssembler {
    fn default() -> Self {
        Self::new(FeatureSchema::viscosity(), FeatureSchema::solids())
    }
}

impl FeatureAssembler {
    /// Creates an assembler with custom schemas.
    pub fn new(viscosity: FeatureSchema, solids: FeatureSchema) -> Self {
        Self { viscosity, solids }
    }

    /// Schema of the viscosity predictor input.
    pub fn viscosity_schema(&self) -> &FeatureSchema {
        &self.viscosity
    }

    /// Schema of the solids predictor input.
    pub fn solids_schema(&self) -> &FeatureSchema {
        &self.solids
    }

    /// Assembles both predictor inputs for given water and Solution E.
    ///
    /// Water and Solution E of the formulation itself are ignored, the
    /// candidate values are used instead.
    pub fn assemble(
        &self,
        formulation: &Formulation,
        water: f64,
        solution_e: f64,
    ) -> Result<(FeatureVector<'_>, FeatureVector<'_>)> {
        Ok(self.bind(formulation)?.fill(water, solution_e))
    }

    /// Resolves every fixed column of the formulation once.
    ///
    /// The returned [`BoundAssembler`] fills in the variables without any
    /// lookups, which is what the search loops call on every evaluation.
    pub fn bind(&self, formulation: &Formulation) -> Result<BoundAssembler<'_>> {
        Ok(BoundAssembler {
            viscosity: BoundSchema::new(&self.viscosity, formulation)?,
            solids: BoundSchema::new(&self.solids, formulation)?,
        })
    }
}

/// Feature assembler bound to the fixed fields of one formulation.
#[derive(Debug, Clone)]
pub struct BoundAssembler<'s> {
    viscosity: BoundSchema<'s>,
    solids: BoundSchema<'s>,
}

impl<'s> BoundAssembler<'s> {
    /// Assembles both predictor inputs for given water and Solution E.
    pub fn fill(&self, water: f64, solution_e: f64) -> (FeatureVector<'s>, FeatureVector<'s>) {
        (
            self.viscosity.fill(water, solution_e),
            self.solids.fill(water, solution_e),
        )
    }
}

#[derive(Debug, Clone)]
struct BoundSchema<'s> {
    schema: &'s FeatureSchema,
    template: Vec<f64>,
    water: Option<usize>,
    solution_e: Option<usize>,
}

impl<'s> BoundSchema<'s> {
    fn new(schema: &'s FeatureSchema, formulation: &Formulation) -> Result<Self> {
        let template = schema
            .columns()
            .iter()
            .map(|column| {
                if column.is_variable() {
                    Ok(0.0)
                } else {
                    formulation.get(*column)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema,
            template,
            water: schema.position(Ingredient::Water),
            solution_e: schema.position(Ingredient::SolutionE),
        })
    }

    fn fill(&self, water: f64, solution_e: f64) -> FeatureVector<'s> {
        let mut values = self.template.clone();

        if let Some(i) = self.water {
            values[i] = water;
        }

        if let Some(i) = self.solution_e {
            values[i] = solution_e;
        }

        FeatureVector {
            schema: self.schema,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::testing::reference_formulation;

    #[test]
    fn viscosity_order() {
        let assembler = FeatureAssembler::default();
        let f = reference_formulation();

        let (v, _) = assembler.assemble(&f, 80.0, 220.0).unwrap();
        assert_eq!(
            v.as_slice(),
            &[3180.0, 4740.0, 220.0, 250.0, 80.0, 0.5556, 0.6030]
        );
    }

    #[test]
    fn solids_order() {
        let assembler = FeatureAssembler::default();
        let f = reference_formulation();

        let (_, s) = assembler.assemble(&f, 80.0, 220.0).unwrap();
        assert_eq!(
            s.as_slice(),
            &[0.5556, 0.6030, 80.0, 3180.0, 220.0, 4740.0]
        );
        assert_eq!(s.get(Ingredient::Water), Some(80.0));
        assert_eq!(s.get(Ingredient::SolutionF), None);
    }

    #[test]
    fn deterministic() {
        let assembler = FeatureAssembler::default();
        let f = reference_formulation();

        let (v1, s1) = assembler.assemble(&f, 61.25, 187.5).unwrap();
        let (v2, s2) = assembler.assemble(&f, 61.25, 187.5).unwrap();

        let bits = |fv: &FeatureVector<'_>| {
            fv.as_slice().iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        };

        assert_eq!(bits(&v1), bits(&v2));
        assert_eq!(bits(&s1), bits(&s2));
    }

    #[test]
    fn variables_need_not_be_present() {
        let f = reference_formulation().with_variables(0.0, 0.0);
        let f: Formulation = f.iter().filter(|(i, _)| !i.is_variable()).collect();

        let assembler = FeatureAssembler::default();
        assert!(assembler.assemble(&f, 1.0, 2.0).is_ok());
    }

    #[test]
    fn missing_field() {
        let f: Formulation = reference_formulation()
            .iter()
            .filter(|(i, _)| *i != Ingredient::EmulsionFSolids)
            .collect();

        let assembler = FeatureAssembler::default();
        assert!(matches!(
            assembler.assemble(&f, 1.0, 2.0),
            Err(Error::Schema(SchemaError::Missing(
                Ingredient::EmulsionFSolids
            )))
        ));
    }

    #[test]
    fn schema_rejects_duplicates() {
        assert!(matches!(
            FeatureSchema::new(vec![Ingredient::Water, Ingredient::Water]),
            Err(Error::Schema(SchemaError::Duplicate(Ingredient::Water)))
        ));
        assert!(matches!(
            FeatureSchema::new(Vec::new()),
            Err(Error::Schema(SchemaError::Empty))
        ));
    }

    #[test]
    fn schema_display() {
        let schema = FeatureSchema::new(vec![Ingredient::Water, Ingredient::SolutionE]).unwrap();
        assert_eq!(schema.to_string(), "water, solution_e");
    }
}
