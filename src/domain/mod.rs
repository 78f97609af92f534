//! Domain layer: Core business types and logic.
//!
//! Pure Rust types with no I/O: the clinical parameter set, the model input
//! row, predictions and their attribution charts.

mod explanation;
mod parameters;
mod prediction;
mod row;

pub use explanation::{
    Attribution, ChartError, ExplanationOutcome, ForcePlot, ForceSegment, Push,
    LABEL_ROTATION_DEGREES, MIN_LABEL_FRACTION,
};
pub use parameters::{ClinicalParameters, ParameterId, ParameterKind, ParameterSpec};
pub use prediction::{Assessment, Prediction, RiskLabel};
pub use row::{check_schema, FeatureRow, SchemaError, FEATURE_COUNT, FEATURE_NAMES};
