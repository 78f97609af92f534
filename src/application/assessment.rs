//! Assessment service: Runs the full Predict action.
//!
//! This service coordinates:
//! - Row assembly from the current parameters
//! - Model acquisition (loaded once, shared)
//! - Prediction (required)
//! - Explanation (best effort)

use std::sync::Arc;

use crate::domain::{Assessment, ClinicalParameters, FeatureRow};
use crate::ports::Classifier;
use crate::Result;

use super::{Explainer, ModelService, Predictor};

/// Service behind the Predict action.
pub struct AssessmentService<M> {
    models: Arc<ModelService<M>>,
}

impl<M: Classifier> AssessmentService<M> {
    #[must_use]
    pub fn new(models: Arc<ModelService<M>>) -> Self {
        Self { models }
    }

    /// Assess one parameter set.
    ///
    /// # Errors
    /// Returns `RunoffError::ModelLoad` if the model cannot be loaded and
    /// `RunoffError::Model` if prediction fails. Explanation failures are
    /// carried inside the returned `Assessment`.
    pub fn assess(&self, params: &ClinicalParameters) -> Result<Assessment> {
        let row = FeatureRow::from_parameters(params);
        tracing::debug!(
            "Assessing row: {}",
            row.iter()
                .map(|(column, value)| format!("{column}={value}"))
                .collect::<Vec<_>>()
                .join(" ")
        );

        let model = self.models.handle()?;
        let prediction = Predictor::predict(model.as_ref(), &row)?;
        let explanation = Explainer::explain(model.as_ref(), &row);

        tracing::info!(
            "Assessment complete: {} (p={:.3}, explanation={})",
            prediction.label,
            prediction.probability,
            if explanation.chart().is_some() {
                "chart"
            } else {
                "failed"
            }
        );

        Ok(Assessment::new(row, prediction, explanation))
    }

    /// Whether the model has been loaded.
    #[must_use]
    pub fn model_loaded(&self) -> bool {
        self.models.is_loaded()
    }
}
