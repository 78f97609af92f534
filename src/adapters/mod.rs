//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external formats:
//! - `gbm`: JSON gradient-boosted tree ensemble with TreeSHAP attribution
//! - `sanitize`: clinical value and secret filtering for logs

pub mod gbm;
pub mod sanitize;

pub use gbm::{GbmModel, LoadOptions, ModelLoadError};
