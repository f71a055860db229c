//! Nearest-neighbor warm start from historical batches.
//!
//! A past batch with similar fixed ingredients is a good starting point for
//! the stepping search. [`HistoricalDataset`] holds such batches together
//! with the water and Solution E that worked for them, and
//! [`locate`] picks the record closest to a query in the Euclidean sense.

use nalgebra::DVectorView;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, SchemaError, ValidationError};
use crate::formulation::{Formulation, Ingredient};

/// One past batch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistoricalRecord {
    /// Values of the dataset columns, in column order.
    pub features: Vec<f64>,
    /// Water used in the batch.
    pub water: f64,
    /// Solution E used in the batch.
    pub solution_e: f64,
}

impl HistoricalRecord {
    /// Creates a record.
    pub fn new(features: Vec<f64>, water: f64, solution_e: f64) -> Self {
        Self {
            features,
            water,
            solution_e,
        }
    }
}

/// Read-only table of past batches.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawDataset"))]
pub struct HistoricalDataset {
    columns: Vec<Ingredient>,
    records: Vec<HistoricalRecord>,
}

impl HistoricalDataset {
    /// Creates a dataset keyed by all fixed ingredients
    /// ([`Ingredient::FIXED`]).
    pub fn new(records: Vec<HistoricalRecord>) -> Result<Self> {
        Self::with_columns(Ingredient::FIXED.to_vec(), records)
    }

    /// Creates a dataset keyed by given columns.
    ///
    /// Every record must have one finite feature per column and finite water
    /// and Solution E.
    pub fn with_columns(columns: Vec<Ingredient>, records: Vec<HistoricalRecord>) -> Result<Self> {
        for record in &records {
            if record.features.len() != columns.len() {
                return Err(SchemaError::Length {
                    expected: columns.len(),
                    found: record.features.len(),
                }
                .into());
            }

            let values = columns
                .iter()
                .copied()
                .zip(record.features.iter().copied())
                .chain([
                    (Ingredient::Water, record.water),
                    (Ingredient::SolutionE, record.solution_e),
                ]);

            for (ingredient, value) in values {
                if !value.is_finite() {
                    return Err(ValidationError::NonFinite { ingredient, value }.into());
                }
            }
        }

        Ok(Self { columns, records })
    }

    /// Builds the dataset from complete past formulations, keyed by all fixed
    /// ingredients.
    pub fn from_formulations<'f, I>(formulations: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'f Formulation>,
    {
        let columns = Ingredient::FIXED.to_vec();
        let records = formulations
            .into_iter()
            .map(|f| {
                Ok(HistoricalRecord::new(
                    query(&columns, f)?,
                    f.water()?,
                    f.solution_e()?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::with_columns(columns, records)
    }

    /// Key columns.
    pub fn columns(&self) -> &[Ingredient] {
        &self.columns
    }

    /// All records.
    pub fn records(&self) -> &[HistoricalRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Water and Solution E of the record closest to the formulation.
    pub fn locate_for(&self, formulation: &Formulation) -> Result<(f64, f64)> {
        locate(&query(&self.columns, formulation)?, &self.records)
    }
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawDataset {
    columns: Vec<Ingredient>,
    records: Vec<HistoricalRecord>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawDataset> for HistoricalDataset {
    type Error = Error;

    fn try_from(raw: RawDataset) -> Result<Self> {
        Self::with_columns(raw.columns, raw.records)
    }
}

fn query(columns: &[Ingredient], formulation: &Formulation) -> Result<Vec<f64>> {
    columns.iter().map(|c| formulation.get(*c)).collect()
}

/// Water and Solution E of the record closest to the query.
///
/// Ties are broken by the first occurrence. Records at an undefined (NaN)
/// distance are skipped.
pub fn locate(partial: &[f64], records: &[HistoricalRecord]) -> Result<(f64, f64)> {
    let query = DVectorView::from_slice(partial, partial.len());

    let mut best: Option<(&HistoricalRecord, f64)> = None;

    for record in records {
        if record.features.len() != partial.len() {
            return Err(SchemaError::Length {
                expected: record.features.len(),
                found: partial.len(),
            }
            .into());
        }

        let features = DVectorView::from_slice(&record.features, record.features.len());
        let distance = (features - query).norm();

        if distance.is_nan() {
            continue;
        }

        match best {
            Some((_, min)) if distance >= min => {}
            _ => best = Some((record, distance)),
        }
    }

    best.map(|(record, _)| (record.water, record.solution_e))
        .ok_or(Error::EmptyDataset)
}
