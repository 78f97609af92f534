//! Predictor: Turns a feature row into a risk label.

use crate::domain::{FeatureRow, Prediction, RiskLabel};
use crate::ports::{Classifier, ModelError};

/// Stateless prediction use case.
pub struct Predictor;

impl Predictor {
    /// Classify one row.
    ///
    /// # Errors
    /// Returns `ModelError::Schema` if the row does not match the model's
    /// columns, and `ModelError::UnexpectedClass` for any class other than
    /// 0 or 1.
    pub fn predict<M: Classifier + ?Sized>(
        model: &M,
        row: &FeatureRow,
    ) -> Result<Prediction, ModelError> {
        row.ensure_schema(model.feature_names())?;

        let class = model.predict_class(row)?;
        let label = RiskLabel::from_class(class).ok_or(ModelError::UnexpectedClass(class))?;
        let probability = model.predict_probability(row)?;

        tracing::debug!("Predicted class {} (p={:.3})", class, probability);

        Ok(Prediction::new(label, probability))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{Attribution, ClinicalParameters, FEATURE_NAMES};
    use crate::ports::AttributionError;

    /// Classifier returning fixed outputs.
    pub(crate) struct FixedClassifier {
        pub names: Vec<String>,
        pub class: i64,
        pub probability: f64,
    }

    impl FixedClassifier {
        pub(crate) fn new(class: i64, probability: f64) -> Self {
            Self {
                names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
                class,
                probability,
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn predict_class(&self, _row: &FeatureRow) -> Result<i64, ModelError> {
            Ok(self.class)
        }

        fn predict_probability(&self, _row: &FeatureRow) -> Result<f64, ModelError> {
            Ok(self.probability)
        }

        fn attribute(&self, _row: &FeatureRow) -> Result<Attribution, AttributionError> {
            Err(AttributionError::Unsupported(
                "fixed classifier has no trees".into(),
            ))
        }
    }

    fn default_row() -> FeatureRow {
        FeatureRow::from_parameters(&ClinicalParameters::default())
    }

    #[test]
    fn test_class_zero_is_low_risk() {
        let prediction = Predictor::predict(&FixedClassifier::new(0, 0.2), &default_row()).unwrap();
        assert_eq!(prediction.label, RiskLabel::Low);
        assert_eq!(prediction.label.as_str(), "Low Risk");
    }

    #[test]
    fn test_class_one_is_high_risk() {
        let prediction = Predictor::predict(&FixedClassifier::new(1, 0.9), &default_row()).unwrap();
        assert_eq!(prediction.label.as_str(), "High Risk");
        assert!((prediction.probability - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unexpected_class_is_rejected() {
        let result = Predictor::predict(&FixedClassifier::new(2, 0.9), &default_row());
        assert!(matches!(result, Err(ModelError::UnexpectedClass(2))));
    }

    #[test]
    fn test_schema_mismatch_is_rejected() {
        let mut model = FixedClassifier::new(0, 0.1);
        model.names.reverse();
        let result = Predictor::predict(&model, &default_row());
        assert!(matches!(result, Err(ModelError::Schema(_))));
    }

    #[test]
    fn test_output_is_always_one_of_two_labels() {
        let model = crate::adapters::gbm::GbmModel::from_json(include_str!(
            "../../models/gbm.json"
        ))
        .unwrap();

        for rutherford in 1..=6 {
            for abi in [0.0, 0.4, 0.8, 1.5] {
                let params = ClinicalParameters::new(2, 3, rutherford, abi, 25.0, 50.0);
                let row = FeatureRow::from_parameters(&params);
                let label = Predictor::predict(&model, &row).unwrap().label;
                assert!(["Low Risk", "High Risk"].contains(&label.as_str()));
            }
        }
    }
}
