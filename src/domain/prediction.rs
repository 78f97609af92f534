//! Prediction result types.
//!
//! Represents the classifier output and its human-readable interpretation.

use serde::{Deserialize, Serialize};

use super::explanation::ExplanationOutcome;
use super::row::FeatureRow;

/// Binary risk classification for poor popliteal runoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLabel {
    /// Class 0
    Low,
    /// Class 1
    High,
}

impl RiskLabel {
    /// Map a raw class label from the model.
    ///
    /// Only `0` and `1` are meaningful; any other class is returned as `None`
    /// instead of being folded into "High Risk".
    #[must_use]
    pub fn from_class(class: i64) -> Option<Self> {
        match class {
            0 => Some(Self::Low),
            1 => Some(Self::High),
            _ => None,
        }
    }

    /// Text shown to the user.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low Risk",
            Self::High => "High Risk",
        }
    }

    /// Get the associated color for TUI display (RGB).
    #[must_use]
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            Self::Low => (16, 185, 129), // Emerald (#10B981)
            Self::High => (244, 63, 94), // Rose (#F43F5E)
        }
    }
}

impl std::fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output for one feature row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Interpreted class
    pub label: RiskLabel,

    /// Probability of the high-risk class (0.0 to 1.0)
    pub probability: f64,
}

impl Prediction {
    #[must_use]
    pub fn new(label: RiskLabel, probability: f64) -> Self {
        Self { label, probability }
    }
}

/// Everything produced by one "Predict" action.
#[derive(Debug, Clone)]
pub struct Assessment {
    /// The row that was scored
    pub row: FeatureRow,

    /// The label prediction (always present)
    pub prediction: Prediction,

    /// Attribution chart or the reason it could not be produced
    pub explanation: ExplanationOutcome,

    /// When the assessment was computed
    pub computed_at: chrono::DateTime<chrono::Utc>,
}

impl Assessment {
    #[must_use]
    pub fn new(row: FeatureRow, prediction: Prediction, explanation: ExplanationOutcome) -> Self {
        Self {
            row,
            prediction,
            explanation,
            computed_at: chrono::Utc::now(),
        }
    }
}
