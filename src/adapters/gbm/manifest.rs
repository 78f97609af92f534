//! Signed model manifest verification.
//!
//! A deployed model directory holds, next to the model JSON:
//! - `manifest.json`: `{ "version": 1, "created_at": <unix secs>, "files": { "<name>": "<sha256 hex>" } }`
//! - `model.sig`: raw 64-byte Ed25519 signature over the exact manifest bytes
//!
//! The loaded model file must be bound by the manifest, so swapping the JSON
//! next to a valid signature is detected.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{LoadOptions, ModelLoadError};

/// File name of the signed manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// File name of the detached signature.
pub const SIGNATURE_FILE: &str = "model.sig";

/// Clock skew allowance for `created_at`.
const MAX_FUTURE_SKEW_SECS: i64 = 300;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignedModelManifest {
    pub version: u32,
    #[serde(default)]
    pub created_at: Option<i64>,
    pub files: BTreeMap<String, String>,
}

fn sig_err(msg: impl Into<String>) -> ModelLoadError {
    ModelLoadError::Signature(msg.into())
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// Constant-time compare for ASCII strings (SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Decode a base64 Ed25519 verifying key.
///
/// # Errors
/// Returns `ModelLoadError::Signature` for bad base64, length, or point.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ModelLoadError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| sig_err("Invalid public key base64"))?;
    let pubkey: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| sig_err("Invalid public key length (expected 32 bytes)"))?;
    VerifyingKey::from_bytes(&pubkey).map_err(|_| sig_err("Invalid verifying key"))
}

/// Read a base64 verifying key from a file.
///
/// # Errors
/// Returns `ModelLoadError::Signature` if the file is unreadable or invalid.
pub fn verifying_key_from_file(path: &Path) -> Result<VerifyingKey, ModelLoadError> {
    let b64 = fs::read_to_string(path)
        .map_err(|e| sig_err(format!("Failed reading pubkey file {path:?}: {e}")))?;
    verifying_key_from_b64(&b64)
}

/// Verify the manifest beside `model_path`.
///
/// `model_bytes` is the model content the caller will parse; the manifest
/// entry for the model is checked against these bytes, not a fresh read.
///
/// Returns `Ok(None)` only when no manifest exists and unsigned models are
/// allowed (debug builds). Otherwise the manifest must be present, signed by
/// `options.verifying_key`, and bind `model_bytes` by hash.
///
/// # Errors
/// Returns `ModelLoadError::Signature` on any verification failure.
pub fn verify_model_signature(
    model_path: &Path,
    model_bytes: &[u8],
    options: &LoadOptions,
) -> Result<Option<SignedModelManifest>, ModelLoadError> {
    let base_dir = model_path.parent().unwrap_or_else(|| Path::new("."));
    let sig_path = base_dir.join(SIGNATURE_FILE);
    let manifest_path = base_dir.join(MANIFEST_FILE);

    if !sig_path.exists() || !manifest_path.exists() {
        if cfg!(debug_assertions) && options.allow_unsigned {
            tracing::warn!(
                "Loading UNSIGNED model {:?}. This is only allowed in debug builds.",
                model_path
            );
            return Ok(None);
        }
        tracing::error!("Model signature not found at {:?}", sig_path);
        return Err(sig_err(format!(
            "{SIGNATURE_FILE} and {MANIFEST_FILE} are required next to the model"
        )));
    }

    let public_key = options
        .verifying_key
        .as_ref()
        .ok_or_else(|| sig_err("No model signing public key configured"))?;

    let sig_bytes =
        fs::read(&sig_path).map_err(|e| sig_err(format!("Failed to read signature: {e}")))?;
    let sig_array: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| sig_err("Invalid signature length (expected 64 bytes)"))?;
    let signature = Signature::from_bytes(&sig_array);

    let manifest_content =
        fs::read(&manifest_path).map_err(|e| sig_err(format!("Failed to read manifest: {e}")))?;

    public_key
        .verify(&manifest_content, &signature)
        .map_err(|_| sig_err("Invalid model signature"))?;

    let manifest: SignedModelManifest = serde_json::from_slice(&manifest_content)
        .map_err(|e| sig_err(format!("Invalid {MANIFEST_FILE} format: {e}")))?;
    if manifest.version != 1 {
        return Err(sig_err(format!(
            "Unsupported manifest version: {}",
            manifest.version
        )));
    }

    if let Some(created_at) = manifest.created_at {
        if created_at > chrono::Utc::now().timestamp() + MAX_FUTURE_SKEW_SECS {
            return Err(sig_err("manifest created_at is in the future"));
        }
    }

    let model_name = model_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| sig_err("Model path has no file name"))?;
    if !manifest.files.contains_key(model_name) {
        return Err(sig_err(format!("{MANIFEST_FILE} does not bind {model_name}")));
    }

    for (rel, expected_hex) in &manifest.files {
        // Entries are bare file names inside the model directory.
        if rel.contains('/') || rel.contains('\\') || rel == ".." {
            return Err(sig_err(format!("Invalid manifest entry {rel:?}")));
        }
        let actual_hex = if rel == model_name {
            sha256_hex(model_bytes)
        } else {
            let path = base_dir.join(rel);
            let bytes = fs::read(&path).map_err(|e| {
                sig_err(format!(
                    "Manifest references missing/unreadable file {path:?}: {e}"
                ))
            })?;
            sha256_hex(&bytes)
        };
        if !constant_time_eq_str(&actual_hex, &expected_hex.to_ascii_lowercase()) {
            return Err(sig_err(format!("File hash mismatch for {rel}")));
        }
    }

    tracing::info!(
        "Verified model manifest ({} file(s), created_at={:?})",
        manifest.files.len(),
        manifest.created_at
    );

    Ok(Some(manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::RngCore;
    use tempfile::tempdir;

    fn signing_key() -> SigningKey {
        let mut sk = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut sk);
        SigningKey::from_bytes(&sk)
    }

    fn write_signed_manifest(dir: &Path, key: &SigningKey, files: &[(&str, &[u8])]) {
        let manifest = SignedModelManifest {
            version: 1,
            created_at: Some(chrono::Utc::now().timestamp()),
            files: files
                .iter()
                .map(|(rel, contents)| ((*rel).to_string(), sha256_hex(contents)))
                .collect(),
        };
        let bytes = serde_json::to_vec(&manifest).expect("serialize manifest");
        fs::write(dir.join(MANIFEST_FILE), &bytes).expect("write manifest");
        let signature: Signature = key.sign(&bytes);
        fs::write(dir.join(SIGNATURE_FILE), signature.to_bytes()).expect("write signature");
    }

    fn options_for(key: &SigningKey) -> LoadOptions {
        LoadOptions {
            allow_unsigned: false,
            verifying_key: Some(key.verifying_key()),
        }
    }

    #[test]
    fn test_accepts_signed_model() {
        let temp = tempdir().expect("tempdir");
        let model_path = temp.path().join("gbm.json");
        fs::write(&model_path, b"{}").expect("write model");

        let key = signing_key();
        write_signed_manifest(temp.path(), &key, &[("gbm.json", b"{}")]);

        let manifest = verify_model_signature(&model_path, b"{}", &options_for(&key))
            .expect("signed model verifies")
            .expect("manifest returned");
        assert!(manifest.files.contains_key("gbm.json"));
    }

    #[test]
    fn test_rejects_hash_mismatch() {
        let temp = tempdir().expect("tempdir");
        let model_path = temp.path().join("gbm.json");
        let key = signing_key();
        write_signed_manifest(temp.path(), &key, &[("gbm.json", b"{}")]);

        fs::write(&model_path, b"{\"tampered\":true}").expect("write model");

        let err = verify_model_signature(&model_path, b"{\"tampered\":true}", &options_for(&key))
            .unwrap_err();
        assert!(err.to_string().contains("hash mismatch"), "{err}");
    }

    #[test]
    fn test_checks_model_entry_against_parsed_bytes() {
        let temp = tempdir().expect("tempdir");
        let model_path = temp.path().join("gbm.json");
        let key = signing_key();
        fs::write(&model_path, b"{}").expect("write model");
        write_signed_manifest(temp.path(), &key, &[("gbm.json", b"{}")]);

        // The file on disk still matches; the bytes about to be parsed do not.
        let err = verify_model_signature(&model_path, b"{\"swapped\":1}", &options_for(&key))
            .unwrap_err();
        assert!(err.to_string().contains("hash mismatch"), "{err}");
    }

    #[test]
    fn test_rejects_wrong_key() {
        let temp = tempdir().expect("tempdir");
        let model_path = temp.path().join("gbm.json");
        fs::write(&model_path, b"{}").expect("write model");
        write_signed_manifest(temp.path(), &signing_key(), &[("gbm.json", b"{}")]);

        let err = verify_model_signature(&model_path, b"{}", &options_for(&signing_key()))
            .unwrap_err();
        assert!(err.to_string().contains("Invalid model signature"), "{err}");
    }

    #[test]
    fn test_rejects_manifest_not_binding_model() {
        let temp = tempdir().expect("tempdir");
        let model_path = temp.path().join("gbm.json");
        fs::write(&model_path, b"{}").expect("write model");
        fs::write(temp.path().join("other.json"), b"[]").expect("write other");

        let key = signing_key();
        write_signed_manifest(temp.path(), &key, &[("other.json", b"[]")]);

        assert!(verify_model_signature(&model_path, b"{}", &options_for(&key)).is_err());
    }

    #[test]
    fn test_unsigned_model_requires_opt_in() {
        let temp = tempdir().expect("tempdir");
        let model_path = temp.path().join("gbm.json");
        fs::write(&model_path, b"{}").expect("write model");

        assert!(verify_model_signature(&model_path, b"{}", &LoadOptions::default()).is_err());

        let allow = LoadOptions {
            allow_unsigned: true,
            verifying_key: None,
        };
        let result = verify_model_signature(&model_path, b"{}", &allow);
        if cfg!(debug_assertions) {
            assert!(matches!(result, Ok(None)));
        } else {
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_verifying_key_from_b64() {
        let key = signing_key();
        let b64 = base64::engine::general_purpose::STANDARD.encode(key.verifying_key().to_bytes());
        let decoded = verifying_key_from_b64(&format!("{b64}\n")).expect("decode");
        assert_eq!(decoded, key.verifying_key());

        assert!(verifying_key_from_b64("not base64!").is_err());
        assert!(verifying_key_from_b64("AAAA").is_err());
    }
}
