//! Gradient-boosted tree ensemble: Implementation of Classifier.
//!
//! The model artifact is a JSON document exported from the training pipeline:
//! a prior log-odds score, a learning rate, and a list of regression trees in
//! flat node-array form (children always stored after their parent). The
//! ensemble margin is `init_score + learning_rate * Σ tree(x)`; class 1 is
//! predicted when the margin is positive.
//!
//! # Attribution
//!
//! When every node carries a `cover` (training weight reaching the node), the
//! model supports exact TreeSHAP attribution in log-odds units. Models exported
//! without covers still predict but report attribution as unsupported.
//!
//! # Security
//!
//! Model files are verified against an Ed25519-signed manifest before parsing
//! (see [`manifest`]). Unsigned models load only in debug builds with
//! `allow_unsigned` set.

pub mod manifest;
mod treeshap;

use std::path::{Path, PathBuf};

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::domain::{check_schema, Attribution, FeatureRow, SchemaError};
use crate::ports::{AttributionError, Classifier, ModelError};

/// Format tag expected in the model document.
pub const MODEL_FORMAT: &str = "gbm-trees";

/// Supported format version.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Error type for model loading.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Failed to read model file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Model file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model signature verification failed: {0}")]
    Signature(String),

    #[error("Unsupported model format `{format}` version {version}")]
    Format { format: String, version: u32 },

    #[error("Model must be a binary classifier with classes [0, 1], found {0:?}")]
    NotBinary(Vec<i64>),

    #[error("Model schema does not match the input form: {0}")]
    Schema(#[from] SchemaError),

    #[error("Tree {tree}, node {node}: {reason}")]
    InvalidTree {
        tree: usize,
        node: usize,
        reason: String,
    },

    #[error("Invalid model parameter: {0}")]
    InvalidParameter(String),
}

/// Model document as written by the export pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedEnsemble {
    pub format: String,
    pub version: u32,
    pub feature_names: Vec<String>,
    pub classes: Vec<i64>,
    pub learning_rate: f64,
    /// Prior log-odds of class 1
    pub init_score: f64,
    pub trees: Vec<ExportedTree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedTree {
    pub nodes: Vec<ExportedNode>,
}

/// One tree node. Split nodes set `feature`, `threshold`, `left` and `right`;
/// leaves set `value`. Rows with `x[feature] <= threshold` go left.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportedNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<usize>,
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
    covers: Option<Vec<f64>>,
}

impl Tree {
    fn predict(&self, x: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes[i] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if x[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// Options controlling how a model file is accepted.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Accept a model without `manifest.json`/`model.sig` (debug builds only)
    pub allow_unsigned: bool,
    /// Key the manifest signature must verify against
    pub verifying_key: Option<VerifyingKey>,
}

/// Validated, immutable gradient-boosted classifier.
#[derive(Debug, Clone)]
pub struct GbmModel {
    feature_names: Vec<String>,
    learning_rate: f64,
    init_score: f64,
    trees: Vec<Tree>,
    /// Baseline log-odds; `None` when covers are missing
    expected_value: Option<f64>,
}

impl GbmModel {
    /// Load, verify and validate a model file.
    ///
    /// # Errors
    /// Returns `ModelLoadError` if the file is missing, unsigned (outside
    /// debug overrides), malformed, or incompatible with the input form.
    pub fn load(path: &Path, options: &LoadOptions) -> Result<Self, ModelLoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        manifest::verify_model_signature(path, content.as_bytes(), options)?;
        let model = Self::from_json(&content)?;

        tracing::info!(
            "Loaded model from {:?} (n_trees={}, learning_rate={}, attribution={})",
            path,
            model.trees.len(),
            model.learning_rate,
            model.supports_attribution()
        );

        Ok(model)
    }

    /// Parse and validate a model document.
    ///
    /// # Errors
    /// Returns `ModelLoadError` if the document is malformed.
    pub fn from_json(content: &str) -> Result<Self, ModelLoadError> {
        let exported: ExportedEnsemble = serde_json::from_str(content)?;
        Self::from_exported(exported)
    }

    /// Validate an exported ensemble.
    ///
    /// # Errors
    /// Returns `ModelLoadError` on any structural problem.
    pub fn from_exported(exported: ExportedEnsemble) -> Result<Self, ModelLoadError> {
        if exported.format != MODEL_FORMAT || exported.version != MODEL_FORMAT_VERSION {
            return Err(ModelLoadError::Format {
                format: exported.format,
                version: exported.version,
            });
        }

        if exported.classes != [0, 1] {
            return Err(ModelLoadError::NotBinary(exported.classes));
        }

        check_schema(&exported.feature_names)?;

        if !exported.learning_rate.is_finite() || exported.learning_rate <= 0.0 {
            return Err(ModelLoadError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                exported.learning_rate
            )));
        }
        if !exported.init_score.is_finite() {
            return Err(ModelLoadError::InvalidParameter(
                "init_score must be finite".into(),
            ));
        }
        if exported.trees.is_empty() {
            return Err(ModelLoadError::InvalidParameter(
                "ensemble contains no trees".into(),
            ));
        }

        let n_features = exported.feature_names.len();
        let trees = exported
            .trees
            .into_iter()
            .enumerate()
            .map(|(t, tree)| validate_tree(t, tree, n_features))
            .collect::<Result<Vec<_>, _>>()?;

        let expected_value = if trees.iter().all(|t| t.covers.is_some()) {
            let sum: f64 = trees
                .iter()
                .filter_map(|t| t.covers.as_deref().map(|c| treeshap::expected_value(t, c)))
                .sum();
            Some(exported.init_score + exported.learning_rate * sum)
        } else {
            None
        };

        Ok(Self {
            feature_names: exported.feature_names,
            learning_rate: exported.learning_rate,
            init_score: exported.init_score,
            trees,
            expected_value,
        })
    }

    /// Raw ensemble output (log-odds of class 1).
    #[must_use]
    pub fn margin(&self, x: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        self.init_score + self.learning_rate * sum
    }

    /// Baseline log-odds used by attribution, if available.
    #[must_use]
    pub fn expected_value(&self) -> Option<f64> {
        self.expected_value
    }

    /// Whether every tree carries cover statistics.
    #[must_use]
    pub fn supports_attribution(&self) -> bool {
        self.expected_value.is_some()
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn checked_margin(&self, row: &FeatureRow) -> Result<f64, ModelError> {
        row.ensure_schema(&self.feature_names)?;
        let margin = self.margin(row.values());
        if !margin.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(margin)
    }
}

fn validate_tree(
    tree_index: usize,
    tree: ExportedTree,
    n_features: usize,
) -> Result<Tree, ModelLoadError> {
    let invalid = |node: usize, reason: String| ModelLoadError::InvalidTree {
        tree: tree_index,
        node,
        reason,
    };

    let len = tree.nodes.len();
    if len == 0 {
        return Err(invalid(0, "tree has no nodes".into()));
    }

    let has_cover = tree.nodes.iter().filter(|n| n.cover.is_some()).count();
    if has_cover != 0 && has_cover != len {
        return Err(invalid(0, "cover must be set on every node or none".into()));
    }

    let mut nodes = Vec::with_capacity(len);
    for (i, node) in tree.nodes.iter().enumerate() {
        let parsed = match (node.feature, node.threshold, node.left, node.right) {
            (None, None, None, None) => {
                if !node.value.is_finite() {
                    return Err(invalid(i, "leaf value is not finite".into()));
                }
                Node::Leaf { value: node.value }
            }
            (Some(feature), Some(threshold), Some(left), Some(right)) => {
                if feature >= n_features {
                    return Err(invalid(i, format!("feature index {feature} out of range")));
                }
                if !threshold.is_finite() {
                    return Err(invalid(i, "threshold is not finite".into()));
                }
                // Children after parents rules out cycles.
                for child in [left, right] {
                    if child <= i || child >= len {
                        return Err(invalid(i, format!("child index {child} is invalid")));
                    }
                }
                if left == right {
                    return Err(invalid(i, "left and right child are the same node".into()));
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }
            }
            _ => {
                return Err(invalid(
                    i,
                    "split nodes need feature, threshold, left and right".into(),
                ))
            }
        };

        if let Some(cover) = node.cover {
            let split = matches!(parsed, Node::Split { .. });
            if !cover.is_finite() || cover < 0.0 || (split && cover == 0.0) {
                return Err(invalid(i, format!("invalid cover {cover}")));
            }
        }

        nodes.push(parsed);
    }

    let covers = if has_cover == len {
        Some(tree.nodes.iter().filter_map(|n| n.cover).collect())
    } else {
        None
    };

    Ok(Tree { nodes, covers })
}

impl Classifier for GbmModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_class(&self, row: &FeatureRow) -> Result<i64, ModelError> {
        let margin = self.checked_margin(row)?;
        Ok(if margin > 0.0 { 1 } else { 0 })
    }

    fn predict_probability(&self, row: &FeatureRow) -> Result<f64, ModelError> {
        let margin = self.checked_margin(row)?;
        Ok(1.0 / (1.0 + (-margin).exp()))
    }

    fn attribute(&self, row: &FeatureRow) -> Result<Attribution, AttributionError> {
        row.ensure_schema(&self.feature_names)?;

        let expected_value = self.expected_value.ok_or_else(|| {
            AttributionError::Unsupported("model was exported without node covers".into())
        })?;

        let x = row.values();
        let mut values = vec![0.0; self.feature_names.len()];
        for tree in &self.trees {
            if let Some(covers) = tree.covers.as_deref() {
                treeshap::accumulate(tree, covers, x, self.learning_rate, &mut values);
            }
        }

        let output_value = self.margin(x);
        if !output_value.is_finite() || values.iter().any(|v| !v.is_finite()) {
            return Err(AttributionError::NonFinite);
        }

        Ok(Attribution {
            expected_value,
            values,
            output_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClinicalParameters, FEATURE_NAMES};

    const FIXTURE: &str = include_str!("../../../models/gbm.json");

    fn fixture() -> GbmModel {
        GbmModel::from_json(FIXTURE).expect("fixture model should validate")
    }

    fn row(p: ClinicalParameters) -> FeatureRow {
        FeatureRow::from_parameters(&p)
    }

    fn expected_feature_names() -> Vec<String> {
        FEATURE_NAMES.iter().map(|s| (*s).to_string()).collect()
    }

    fn stump_ensemble() -> ExportedEnsemble {
        ExportedEnsemble {
            format: MODEL_FORMAT.into(),
            version: MODEL_FORMAT_VERSION,
            feature_names: expected_feature_names(),
            classes: vec![0, 1],
            learning_rate: 1.0,
            init_score: 0.0,
            trees: vec![ExportedTree {
                nodes: vec![
                    ExportedNode {
                        feature: Some(3),
                        threshold: Some(0.9),
                        left: Some(1),
                        right: Some(2),
                        cover: Some(10.0),
                        ..Default::default()
                    },
                    ExportedNode {
                        value: 1.0,
                        cover: Some(4.0),
                        ..Default::default()
                    },
                    ExportedNode {
                        value: -1.0,
                        cover: Some(6.0),
                        ..Default::default()
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_fixture_defaults_are_low_risk() {
        let model = fixture();
        let r = row(ClinicalParameters::default());

        // -0.2 + 0.5 * (-0.4 - 0.3 - 0.35)
        assert!((model.margin(r.values()) + 0.725).abs() < 1e-12);
        assert_eq!(model.predict_class(&r).unwrap(), 0);

        let p = model.predict_probability(&r).unwrap();
        assert!(p > 0.32 && p < 0.33, "p = {p}");
    }

    #[test]
    fn test_fixture_severe_inputs_are_high_risk() {
        let model = fixture();
        let r = row(ClinicalParameters::new(4, 4, 6, 0.3, 10.0, 20.0));

        // -0.2 + 0.5 * (1.2 + 0.8 + 0.5)
        assert!((model.margin(r.values()) - 1.05).abs() < 1e-12);
        assert_eq!(model.predict_class(&r).unwrap(), 1);
    }

    #[test]
    fn test_fixture_expected_value() {
        let model = fixture();
        let expected = model.expected_value().expect("fixture has covers");
        assert!((expected + 0.015).abs() < 1e-12, "expected = {expected}");
    }

    #[test]
    fn test_fixture_attribution_at_defaults() {
        let model = fixture();
        let r = row(ClinicalParameters::default());
        let attr = model.attribute(&r).expect("attribution");

        assert_eq!(attr.values.len(), 6);
        assert!(attr.additivity_gap() < 1e-12);

        // Hand-computed Shapley values (log-odds), scaled by the learning rate.
        let expected = [
            -0.078_928_571_428_571_4,
            -0.1225,
            -0.0375,
            -0.12,
            -0.2375,
            -0.113_571_428_571_428_6,
        ];
        for (i, (got, want)) in attr.values.iter().zip(expected.iter()).enumerate() {
            assert!((got - want).abs() < 1e-9, "feature {i}: {got} vs {want}");
        }
    }

    #[test]
    fn test_attribution_is_additive_across_inputs() {
        let model = fixture();
        for params in [
            ClinicalParameters::new(1, 1, 1, 1.5, 100.0, 150.0),
            ClinicalParameters::new(3, 4, 5, 0.55, 29.9, 45.0),
            ClinicalParameters::new(4, 4, 6, 0.0, 0.0, 0.0),
        ] {
            let attr = model.attribute(&row(params)).expect("attribution");
            assert!(attr.additivity_gap() < 1e-9);
        }
    }

    #[test]
    fn test_model_without_covers_predicts_but_cannot_attribute() {
        let mut exported = stump_ensemble();
        for node in &mut exported.trees[0].nodes {
            node.cover = None;
        }
        let model = GbmModel::from_exported(exported).expect("valid without covers");
        let r = row(ClinicalParameters::default());

        assert!(!model.supports_attribution());
        assert_eq!(model.predict_class(&r).unwrap(), 1);
        assert!(matches!(
            model.attribute(&r),
            Err(AttributionError::Unsupported(_))
        ));
    }

    #[test]
    fn test_rejects_non_binary_classes() {
        let mut exported = stump_ensemble();
        exported.classes = vec![0, 1, 2];
        assert!(matches!(
            GbmModel::from_exported(exported),
            Err(ModelLoadError::NotBinary(c)) if c == vec![0, 1, 2]
        ));
    }

    #[test]
    fn test_rejects_schema_mismatch() {
        let mut exported = stump_ensemble();
        exported.feature_names.swap(0, 1);
        assert!(matches!(
            GbmModel::from_exported(exported),
            Err(ModelLoadError::Schema(SchemaError::Column { position: 0, .. }))
        ));
    }

    #[test]
    fn test_rejects_cycles_and_bad_indices() {
        let mut exported = stump_ensemble();
        exported.trees[0].nodes[0].left = Some(0);
        assert!(matches!(
            GbmModel::from_exported(exported),
            Err(ModelLoadError::InvalidTree { tree: 0, node: 0, .. })
        ));

        let mut exported = stump_ensemble();
        exported.trees[0].nodes[0].feature = Some(6);
        assert!(matches!(
            GbmModel::from_exported(exported),
            Err(ModelLoadError::InvalidTree { .. })
        ));
    }

    #[test]
    fn test_rejects_partial_covers_and_unknown_format() {
        let mut exported = stump_ensemble();
        exported.trees[0].nodes[2].cover = None;
        assert!(matches!(
            GbmModel::from_exported(exported),
            Err(ModelLoadError::InvalidTree { .. })
        ));

        let mut exported = stump_ensemble();
        exported.format = "pickle".into();
        assert!(matches!(
            GbmModel::from_exported(exported),
            Err(ModelLoadError::Format { .. })
        ));
    }

    #[test]
    fn test_load_signed_fixture() {
        use ed25519_dalek::{Signer, SigningKey};

        let temp = tempfile::tempdir().expect("tempdir");
        let model_path = temp.path().join("gbm.json");
        std::fs::write(&model_path, FIXTURE).expect("write model");

        let key = SigningKey::from_bytes(&[7u8; 32]);
        let manifest = manifest::SignedModelManifest {
            version: 1,
            created_at: None,
            files: [("gbm.json".to_string(), manifest::sha256_hex(FIXTURE.as_bytes()))]
                .into_iter()
                .collect(),
        };
        let bytes = serde_json::to_vec(&manifest).expect("serialize manifest");
        std::fs::write(temp.path().join(manifest::MANIFEST_FILE), &bytes).expect("write");
        std::fs::write(
            temp.path().join(manifest::SIGNATURE_FILE),
            key.sign(&bytes).to_bytes(),
        )
        .expect("write");

        let options = LoadOptions {
            allow_unsigned: false,
            verifying_key: Some(key.verifying_key()),
        };
        let model = GbmModel::load(&model_path, &options).expect("signed model loads");
        assert_eq!(model.n_trees(), 3);
        assert!(model.supports_attribution());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = GbmModel::load(&temp.path().join("absent.json"), &LoadOptions::default());
        assert!(matches!(result, Err(ModelLoadError::Io { .. })));
    }

    #[test]
    fn test_corrupt_json_is_a_parse_error() {
        assert!(matches!(
            GbmModel::from_json("{ not json"),
            Err(ModelLoadError::Parse(_))
        ));
    }
}
