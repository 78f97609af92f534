//! # Runoff
//!
//! Risk assessment for poor popliteal artery runoff after endovascular
//! treatment.
//!
//! This crate provides:
//! - A six-parameter clinical input form in the terminal
//! - A gradient-boosted tree classifier loaded from a signed JSON artifact
//! - Exact TreeSHAP explanations drawn as a force chart
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (clinical parameters, feature row, prediction, force plot)
//! - `ports`: Trait definitions for the trained model
//! - `adapters`: Concrete implementations (tree ensemble, log sanitization)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Environment configuration
//! - `tui`: Terminal user interface

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod tui;

pub use domain::{Assessment, ClinicalParameters, FeatureRow, RiskLabel};

/// Result type for Runoff operations
pub type Result<T> = std::result::Result<T, RunoffError>;

/// Main error type for Runoff
#[derive(Debug, thiserror::Error)]
pub enum RunoffError {
    #[error("Model could not be loaded: {0}")]
    ModelLoad(#[from] adapters::gbm::ModelLoadError),

    #[error("Prediction failed: {0}")]
    Model(#[from] ports::ModelError),
}
