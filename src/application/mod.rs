//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with the classifier port to
//! implement the Predict action.

mod assessment;
mod explainer;
mod model_service;
mod predictor;

pub use assessment::AssessmentService;
pub use explainer::Explainer;
pub use model_service::ModelService;
pub use predictor::Predictor;
