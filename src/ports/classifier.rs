//! Classifier port: Trait for the trained risk model.
//!
//! This trait abstracts the model format (JSON tree ensemble) from the
//! prediction and explanation use cases.

use crate::domain::{Attribution, FeatureRow, SchemaError};

/// Errors raised while scoring a row.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Input row does not match the model schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("Model produced class {0}, expected 0 or 1")]
    UnexpectedClass(i64),

    #[error("Model produced a non-finite score")]
    NonFinite,
}

/// Errors raised while computing feature attributions.
#[derive(Debug, thiserror::Error)]
pub enum AttributionError {
    #[error("model does not support attribution: {0}")]
    Unsupported(String),

    #[error("input row does not match the model schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("attribution produced a non-finite value")]
    NonFinite,
}

/// Trait for a trained binary classifier.
///
/// Implementations provide:
/// - The training schema (feature names in order)
/// - Class prediction and positive-class probability
/// - Additive per-feature attribution, where the model supports it
pub trait Classifier: Send + Sync {
    /// Feature names the model was fit on, in order.
    fn feature_names(&self) -> &[String];

    /// Predict the raw class label for one row.
    ///
    /// # Errors
    /// Returns `ModelError` if the row cannot be scored.
    fn predict_class(&self, row: &FeatureRow) -> Result<i64, ModelError>;

    /// Probability of class 1 for one row.
    ///
    /// # Errors
    /// Returns `ModelError` if the row cannot be scored.
    fn predict_probability(&self, row: &FeatureRow) -> Result<f64, ModelError>;

    /// Attribution values for one row, relative to the model's expected output.
    ///
    /// # Errors
    /// Returns `AttributionError::Unsupported` if the model lacks the
    /// statistics attribution requires.
    fn attribute(&self, row: &FeatureRow) -> Result<Attribution, AttributionError>;
}
