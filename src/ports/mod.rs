//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundary
//! between the use cases and the trained model.

mod classifier;

pub use classifier::{AttributionError, Classifier, ModelError};
