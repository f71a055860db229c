//! Interface to the regression predictors.
//!
//! The predictors are trained offline and treated as opaque pure functions.
//! Anything implementing [`Predictor`] can be plugged into the
//! [`Engine`](crate::Engine): an exported [`LinearModel`], a closure wrapped in
//! [`FnPredictor`], or a binding to an external model runtime.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::features::{FeatureSchema, FeatureVector};

/// A regression function producing one scalar from one feature row.
///
/// Predictors are called hundreds to thousands of times per run and must be
/// free of side effects.
pub trait Predictor {
    /// Predicts the value for given features.
    fn predict(&self, features: &FeatureVector<'_>) -> f64;

    /// Columns (in order) the predictor was trained on, if known.
    ///
    /// When declared, the engine refuses to run if the assembler would feed
    /// different columns.
    fn schema(&self) -> Option<&FeatureSchema> {
        None
    }
}

impl<P: Predictor + ?Sized> Predictor for &P {
    fn predict(&self, features: &FeatureVector<'_>) -> f64 {
        (**self).predict(features)
    }

    fn schema(&self) -> Option<&FeatureSchema> {
        (**self).schema()
    }
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn predict(&self, features: &FeatureVector<'_>) -> f64 {
        (**self).predict(features)
    }

    fn schema(&self) -> Option<&FeatureSchema> {
        (**self).schema()
    }
}

/// Checks that a predictor accepts the columns produced for it.
pub(crate) fn check_schema<P: Predictor + ?Sized>(
    what: &'static str,
    predictor: &P,
    provided: &FeatureSchema,
) -> Result<()> {
    match predictor.schema() {
        Some(expected) if expected != provided => Err(SchemaError::Mismatch {
            what,
            expected: expected.to_string(),
            found: provided.to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}

/// Linear regression exported as intercept and coefficients.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawLinearModel"))]
pub struct LinearModel {
    schema: FeatureSchema,
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearModel {
    /// Creates the model. There must be one coefficient per schema column.
    pub fn new(schema: FeatureSchema, intercept: f64, coefficients: Vec<f64>) -> Result<Self> {
        if schema.len() != coefficients.len() {
            return Err(SchemaError::Length {
                expected: schema.len(),
                found: coefficients.len(),
            }
            .into());
        }

        Ok(Self {
            schema,
            intercept,
            coefficients,
        })
    }

    /// Intercept term.
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Coefficients in schema order.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawLinearModel {
    schema: FeatureSchema,
    intercept: f64,
    coefficients: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawLinearModel> for LinearModel {
    type Error = crate::error::Error;

    fn try_from(raw: RawLinearModel) -> Result<Self> {
        Self::new(raw.schema, raw.intercept, raw.coefficients)
    }
}

impl Predictor for LinearModel {
    fn predict(&self, features: &FeatureVector<'_>) -> f64 {
        debug_assert_eq!(features.len(), self.coefficients.len());

        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.as_slice())
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }

    fn schema(&self) -> Option<&FeatureSchema> {
        Some(&self.schema)
    }
}

/// Predictor backed by a closure.
///
/// ```rust
/// use viscotune::{FnPredictor, Ingredient};
///
/// let solids = FnPredictor::new(|features| {
///     0.52 - 0.0001 * features.get(Ingredient::Water).unwrap_or(0.0)
/// });
/// ```
pub struct FnPredictor<F> {
    f: F,
    schema: Option<FeatureSchema>,
}

impl<F> FnPredictor<F>
where
    F: Fn(&FeatureVector<'_>) -> f64,
{
    /// Wraps the closure.
    pub fn new(f: F) -> Self {
        Self { f, schema: None }
    }

    /// Declares the columns the closure expects.
    pub fn with_schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

impl<F> Predictor for FnPredictor<F>
where
    F: Fn(&FeatureVector<'_>) -> f64,
{
    fn predict(&self, features: &FeatureVector<'_>) -> f64 {
        (self.f)(features)
    }

    fn schema(&self) -> Option<&FeatureSchema> {
        self.schema.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::error::Error;
    use crate::features::FeatureAssembler;
    use crate::formulation::Ingredient;
    use crate::testing::reference_formulation;

    #[test]
    fn linear_model() {
        let schema = FeatureSchema::new(vec![Ingredient::Water, Ingredient::SolutionE]).unwrap();
        let provided = schema.clone();
        let model = LinearModel::new(schema, 100.0, vec![2.0, -0.5]).unwrap();

        let assembler = FeatureAssembler::new(provided.clone(), provided);
        let (v, _) = assembler
            .assemble(&reference_formulation(), 10.0, 20.0)
            .unwrap();

        assert_relative_eq!(model.predict(&v), 100.0 + 20.0 - 10.0);
    }

    #[test]
    fn linear_model_length_mismatch() {
        assert!(matches!(
            LinearModel::new(FeatureSchema::solids(), 0.0, vec![1.0]),
            Err(Error::Schema(SchemaError::Length {
                expected: 6,
                found: 1
            }))
        ));
    }

    #[test]
    fn schema_check() {
        let model = LinearModel::new(FeatureSchema::solids(), 0.0, vec![0.0; 6]).unwrap();

        assert!(check_schema("solids", &model, &FeatureSchema::solids()).is_ok());
        assert!(matches!(
            check_schema("solids", &model, &FeatureSchema::viscosity()),
            Err(Error::Schema(SchemaError::Mismatch { what: "solids", .. }))
        ));

        let opaque = FnPredictor::new(|_: &FeatureVector<'_>| 1.0);
        assert!(check_schema("viscosity", &opaque, &FeatureSchema::solids()).is_ok());
    }

    #[test]
    fn boxed_and_borrowed() {
        let p: Box<dyn Predictor> = Box::new(FnPredictor::new(|_: &FeatureVector<'_>| 42.0));
        let assembler = FeatureAssembler::default();
        let (v, _) = assembler
            .assemble(&reference_formulation(), 1.0, 1.0)
            .unwrap();

        assert_eq!(p.predict(&v), 42.0);
        assert_eq!((&p).predict(&v), 42.0);
        assert!(p.schema().is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialized_model_is_checked() {
        let model = LinearModel::new(
            FeatureSchema::new(vec![Ingredient::Water, Ingredient::SolutionE]).unwrap(),
            1.0,
            vec![2.0, 3.0],
        )
        .unwrap();

        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(serde_json::from_str::<LinearModel>(&json).unwrap(), model);

        let short = r#"{"schema":["water","solution_e"],"intercept":0.0,"coefficients":[1.0]}"#;
        assert!(serde_json::from_str::<LinearModel>(short).is_err());
    }
}
