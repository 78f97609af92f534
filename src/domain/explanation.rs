//! Additive feature attributions and their force-chart layout.
//!
//! A force chart starts from the model's baseline (expected value) and shows
//! each feature pushing the output higher or lower. Positive contributions are
//! stacked immediately left of the output value, negative ones immediately
//! right of it, largest first, so the two stacks meet at `output_value`.

use serde::{Deserialize, Serialize};

use super::parameters::ParameterId;
use super::row::{FeatureRow, FEATURE_COUNT};

/// Contributions below this share of the total magnitude are drawn unlabeled.
pub const MIN_LABEL_FRACTION: f64 = 0.05;

/// Label slant used by the chart renderer, in degrees.
pub const LABEL_ROTATION_DEGREES: f64 = 15.0;

/// Per-feature attribution values for one row, in log-odds units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    /// Baseline: mean model output over the training distribution
    pub expected_value: f64,

    /// One value per feature, in row column order
    pub values: Vec<f64>,

    /// Model output for this row
    pub output_value: f64,
}

impl Attribution {
    /// Sum of all feature attributions.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Difference between `expected_value + total()` and `output_value`.
    #[must_use]
    pub fn additivity_gap(&self) -> f64 {
        (self.expected_value + self.total() - self.output_value).abs()
    }
}

/// Direction a feature moves the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Higher,
    Lower,
}

/// One bar of the force chart, in output (log-odds) coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceSegment {
    pub feature: &'static str,
    /// `"feature = value"`
    pub label: String,
    pub attribution: f64,
    pub start: f64,
    pub end: f64,
    pub show_label: bool,
}

impl ForceSegment {
    #[must_use]
    pub fn push(&self) -> Push {
        if self.attribution >= 0.0 {
            Push::Higher
        } else {
            Push::Lower
        }
    }
}

/// Reasons a force chart cannot be laid out.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChartError {
    #[error("expected {expected} attribution values, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("attribution for `{0}` is not finite")]
    NonFinite(&'static str),

    #[error("base value or model output is not finite")]
    NonFiniteBase,

    #[error("attributions do not add up to the model output (gap {0:.3e})")]
    NotAdditive(f64),
}

/// Laid-out force chart for one prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcePlot {
    pub base_value: f64,
    pub output_value: f64,
    /// Features pushing higher, then features pushing lower
    pub segments: Vec<ForceSegment>,
    pub axis_min: f64,
    pub axis_max: f64,
}

impl ForcePlot {
    /// Lay out a force chart from attribution values for `row`.
    ///
    /// # Errors
    /// Returns `ChartError` if the attribution is malformed.
    pub fn build(attribution: &Attribution, row: &FeatureRow) -> Result<Self, ChartError> {
        if attribution.values.len() != FEATURE_COUNT {
            return Err(ChartError::Length {
                expected: FEATURE_COUNT,
                actual: attribution.values.len(),
            });
        }
        if !attribution.expected_value.is_finite() || !attribution.output_value.is_finite() {
            return Err(ChartError::NonFiniteBase);
        }
        for (column, value) in row.columns().iter().zip(attribution.values.iter()) {
            if !value.is_finite() {
                return Err(ChartError::NonFinite(*column));
            }
        }

        let tolerance = 1e-6 * attribution.output_value.abs().max(1.0);
        let gap = attribution.additivity_gap();
        if gap > tolerance {
            return Err(ChartError::NotAdditive(gap));
        }

        let magnitude: f64 = attribution.values.iter().map(|v| v.abs()).sum();

        let mut higher: Vec<usize> = (0..FEATURE_COUNT)
            .filter(|&i| attribution.values[i] > 0.0)
            .collect();
        let mut lower: Vec<usize> = (0..FEATURE_COUNT)
            .filter(|&i| attribution.values[i] < 0.0)
            .collect();
        let by_magnitude = |a: &usize, b: &usize| {
            attribution.values[*b]
                .abs()
                .total_cmp(&attribution.values[*a].abs())
        };
        higher.sort_by(by_magnitude);
        lower.sort_by(by_magnitude);

        let mut segments = Vec::with_capacity(higher.len() + lower.len());

        let mut cursor = attribution.output_value;
        for i in higher {
            let v = attribution.values[i];
            segments.push(Self::segment(i, v, cursor - v, cursor, magnitude, row));
            cursor -= v;
        }
        let left = cursor;

        let mut cursor = attribution.output_value;
        for i in lower {
            let v = attribution.values[i];
            segments.push(Self::segment(i, v, cursor, cursor - v, magnitude, row));
            cursor -= v;
        }
        let right = cursor;

        let lo = left.min(attribution.expected_value).min(attribution.output_value);
        let hi = right.max(attribution.expected_value).max(attribution.output_value);
        let pad = ((hi - lo) * 0.05).max(0.05);

        Ok(Self {
            base_value: attribution.expected_value,
            output_value: attribution.output_value,
            segments,
            axis_min: lo - pad,
            axis_max: hi + pad,
        })
    }

    fn segment(
        index: usize,
        attribution: f64,
        start: f64,
        end: f64,
        magnitude: f64,
        row: &FeatureRow,
    ) -> ForceSegment {
        let id = ParameterId::ALL[index];
        let spec = id.spec();
        let value = row.values()[index];
        ForceSegment {
            feature: spec.column,
            label: format!("{} = {}", spec.column, spec.format(value)),
            attribution,
            start,
            end,
            show_label: magnitude > 0.0 && attribution.abs() / magnitude >= MIN_LABEL_FRACTION,
        }
    }

    /// Segments that move the output higher.
    pub fn pushing_higher(&self) -> impl Iterator<Item = &ForceSegment> {
        self.segments.iter().filter(|s| s.push() == Push::Higher)
    }

    /// Segments that move the output lower.
    pub fn pushing_lower(&self) -> impl Iterator<Item = &ForceSegment> {
        self.segments.iter().filter(|s| s.push() == Push::Lower)
    }
}

/// Result of the explanation step.
///
/// A failed explanation carries the text to show in place of the chart; it
/// never invalidates the prediction it accompanies.
#[derive(Debug, Clone, PartialEq)]
pub enum ExplanationOutcome {
    Chart(ForcePlot),
    Failed { message: String },
}

impl ExplanationOutcome {
    /// Build the failure variant from any error.
    #[must_use]
    pub fn failed(cause: impl std::fmt::Display) -> Self {
        Self::Failed {
            message: format!("Error generating explanation: {cause}"),
        }
    }

    #[must_use]
    pub fn chart(&self) -> Option<&ForcePlot> {
        match self {
            Self::Chart(plot) => Some(plot),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Chart(_) => None,
            Self::Failed { message } => Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClinicalParameters;

    fn default_row() -> FeatureRow {
        FeatureRow::from_parameters(&ClinicalParameters::default())
    }

    fn attribution(values: Vec<f64>, expected_value: f64) -> Attribution {
        let output_value = expected_value + values.iter().sum::<f64>();
        Attribution {
            expected_value,
            values,
            output_value,
        }
    }

    #[test]
    fn test_stacks_meet_at_output_value() {
        let attr = attribution(vec![0.4, -0.1, 0.2, -0.3, 0.0, 0.01], -0.5);
        let plot = ForcePlot::build(&attr, &default_row()).expect("layout");

        let higher: Vec<&ForceSegment> = plot.pushing_higher().collect();
        let lower: Vec<&ForceSegment> = plot.pushing_lower().collect();

        // zero contributions are omitted
        assert_eq!(higher.len() + lower.len(), 5);

        // largest push sits next to the output value on both sides
        assert_eq!(higher[0].feature, "degree_of_popliteal_artery_stenosis");
        assert!((higher[0].end - attr.output_value).abs() < 1e-12);
        assert_eq!(lower[0].feature, "ABI");
        assert!((lower[0].start - attr.output_value).abs() < 1e-12);

        // outer ends are base ± opposite-direction total
        let left = higher.last().map(|s| s.start).unwrap_or(attr.output_value);
        assert!((left - (attr.expected_value - 0.4)).abs() < 1e-12);
        let right = lower.last().map(|s| s.end).unwrap_or(attr.output_value);
        assert!((right - (attr.expected_value + 0.61)).abs() < 1e-12);

        assert!(plot.axis_min < left && plot.axis_max > right);
    }

    #[test]
    fn test_small_contributions_are_unlabeled() {
        let attr = attribution(vec![0.4, -0.1, 0.2, -0.3, 0.0, 0.01], 0.0);
        let plot = ForcePlot::build(&attr, &default_row()).expect("layout");

        let egfr = plot.segments.iter().find(|s| s.feature == "eGFR").expect("eGFR");
        assert!(!egfr.show_label);

        let abi = plot.segments.iter().find(|s| s.feature == "ABI").expect("ABI");
        assert!(abi.show_label);
        assert_eq!(abi.label, "ABI = 0.80");
        assert_eq!(abi.push(), Push::Lower);
    }

    #[test]
    fn test_rejects_malformed_attributions() {
        let row = default_row();

        let short = attribution(vec![0.1; 5], 0.0);
        assert!(matches!(
            ForcePlot::build(&short, &row),
            Err(ChartError::Length { expected: 6, actual: 5 })
        ));

        let mut nan = attribution(vec![0.1; 6], 0.0);
        nan.values[4] = f64::NAN;
        assert_eq!(ForcePlot::build(&nan, &row), Err(ChartError::NonFinite("TcPO2")));

        let mut gap = attribution(vec![0.1; 6], 0.0);
        gap.output_value += 1.0;
        assert!(matches!(ForcePlot::build(&gap, &row), Err(ChartError::NotAdditive(_))));
    }

    #[test]
    fn test_failed_outcome_message() {
        let outcome = ExplanationOutcome::failed("model has no cover statistics");
        assert_eq!(
            outcome.error_message(),
            Some("Error generating explanation: model has no cover statistics")
        );
        assert!(outcome.chart().is_none());
    }
}
