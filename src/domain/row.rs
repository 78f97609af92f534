//! Single-row feature table handed to the classifier.

use serde::{Deserialize, Serialize};

use super::parameters::{ClinicalParameters, ParameterId};

/// Number of model features.
pub const FEATURE_COUNT: usize = 6;

/// Column names the model was trained on, in training order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "degree_of_popliteal_artery_stenosis",
    "degree_of_infrapopliteal_arteries_stenosis",
    "Rutherford",
    "ABI",
    "TcPO2",
    "eGFR",
];

/// Mismatch between the row's columns and a model's training schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("model expects {expected} features, row has {actual}")]
    Count { expected: usize, actual: usize },

    #[error("column {position} is `{actual}`, model expects `{expected}`")]
    Column {
        position: usize,
        expected: String,
        actual: String,
    },
}

/// One labeled row of model input.
///
/// Values are stored in `FEATURE_NAMES` order and are never transformed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    values: [f64; FEATURE_COUNT],
}

impl FeatureRow {
    /// Assemble the row from the current parameter set.
    #[must_use]
    pub fn from_parameters(params: &ClinicalParameters) -> Self {
        let mut values = [0.0; FEATURE_COUNT];
        for id in ParameterId::ALL {
            values[id.index()] = params.get(id);
        }
        Self { values }
    }

    /// Column names, in order.
    #[must_use]
    pub fn columns(&self) -> &'static [&'static str; FEATURE_COUNT] {
        &FEATURE_NAMES
    }

    /// Values, in column order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Look up a value by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|c| *c == column)
            .map(|i| self.values[i])
    }

    /// Iterate `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }

    /// Check that a model's feature names match this row exactly (name and order).
    ///
    /// # Errors
    /// Returns the first mismatch found.
    pub fn ensure_schema<S: AsRef<str>>(&self, expected: &[S]) -> Result<(), SchemaError> {
        check_schema(expected)
    }
}

/// Check a feature-name list against `FEATURE_NAMES` (name and order).
///
/// # Errors
/// Returns the first mismatch found.
pub fn check_schema<S: AsRef<str>>(expected: &[S]) -> Result<(), SchemaError> {
    if expected.len() != FEATURE_COUNT {
        return Err(SchemaError::Count {
            expected: expected.len(),
            actual: FEATURE_COUNT,
        });
    }

    for (position, (want, have)) in expected.iter().zip(FEATURE_NAMES.iter()).enumerate() {
        if want.as_ref() != *have {
            return Err(SchemaError::Column {
                position,
                expected: want.as_ref().to_string(),
                actual: (*have).to_string(),
            });
        }
    }

    Ok(())
}
