//! Explainer: Builds the force-plot explanation for one row.
//!
//! Explanation is best effort. Any attribution or layout failure is turned
//! into `ExplanationOutcome::Failed` so the prediction can still be shown.

use crate::domain::{ExplanationOutcome, FeatureRow, ForcePlot};
use crate::ports::Classifier;

/// Stateless explanation use case.
pub struct Explainer;

impl Explainer {
    /// Attribute the model output for `row` and lay out the force plot.
    pub fn explain<M: Classifier + ?Sized>(model: &M, row: &FeatureRow) -> ExplanationOutcome {
        let attribution = match model.attribute(row) {
            Ok(attribution) => attribution,
            Err(e) => {
                tracing::warn!("Attribution failed: {}", e);
                return ExplanationOutcome::failed(e);
            }
        };

        match ForcePlot::build(&attribution, row) {
            Ok(plot) => {
                tracing::debug!(
                    "Force plot built: base={:.3}, output={:.3}, {} segment(s)",
                    plot.base_value,
                    plot.output_value,
                    plot.segments.len()
                );
                ExplanationOutcome::Chart(plot)
            }
            Err(e) => {
                tracing::warn!("Force plot layout failed: {}", e);
                ExplanationOutcome::failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::gbm::GbmModel;
    use crate::application::predictor::tests::FixedClassifier;
    use crate::domain::{Attribution, ClinicalParameters};
    use crate::ports::{AttributionError, ModelError};

    fn default_row() -> FeatureRow {
        FeatureRow::from_parameters(&ClinicalParameters::default())
    }

    #[test]
    fn test_fixture_produces_chart() {
        let model = GbmModel::from_json(include_str!("../../models/gbm.json")).unwrap();
        let outcome = Explainer::explain(&model, &default_row());

        let plot = outcome.chart().expect("chart");
        assert!((plot.base_value + 0.015).abs() < 1e-9);
        assert!((plot.output_value + 0.725).abs() < 1e-9);
        assert_eq!(plot.segments.len(), 6);
        // Every value at the defaults pushes the risk down.
        assert_eq!(plot.pushing_higher().count(), 0);
    }

    #[test]
    fn test_unsupported_model_yields_failed_outcome() {
        let outcome = Explainer::explain(&FixedClassifier::new(1, 0.8), &default_row());

        let message = outcome.error_message().expect("failed outcome");
        assert!(message.starts_with("Error generating explanation: "));
        assert!(message.contains("does not support attribution"));
    }

    struct ShortAttribution(FixedClassifier);

    impl Classifier for ShortAttribution {
        fn feature_names(&self) -> &[String] {
            self.0.feature_names()
        }

        fn predict_class(&self, row: &FeatureRow) -> Result<i64, ModelError> {
            self.0.predict_class(row)
        }

        fn predict_probability(&self, row: &FeatureRow) -> Result<f64, ModelError> {
            self.0.predict_probability(row)
        }

        fn attribute(&self, _row: &FeatureRow) -> Result<Attribution, AttributionError> {
            Ok(Attribution {
                expected_value: 0.0,
                values: vec![0.1, 0.2],
                output_value: 0.3,
            })
        }
    }

    #[test]
    fn test_layout_error_yields_failed_outcome() {
        let model = ShortAttribution(FixedClassifier::new(0, 0.1));
        let outcome = Explainer::explain(&model, &default_row());
        assert!(outcome
            .error_message()
            .is_some_and(|m| m.starts_with("Error generating explanation: ")));
    }
}
