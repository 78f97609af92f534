//! Model signing utility.
//!
//! Two subcommands:
//! - `keygen`: generate an Ed25519 signing seed and its public key
//! - `sign`: validate a model file, then write `manifest.json` binding it by
//!   SHA-256 and `model.sig` over the manifest bytes
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin model_signing -- keygen --out-seed <path> [--out-pub <path>] [--force]
//! cargo run --bin model_signing -- sign <model_path> [--key-file <path>]
//! ```
//!
//! The signing seed is read from `--key-file` or
//! `RUNOFF_MODEL_SIGNING_KEY_B64_FILE`. The app verifies with the public key
//! named by `RUNOFF_MODEL_SIGNING_PUBKEY_B64_FILE`.
//!
//! # Security
//!
//! - Uses OS entropy (OsRng) for key generation
//! - Seed files are written with 0600 permissions (Unix)
//! - Seed material is zeroized after use

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use runoff::adapters::gbm::manifest::{
    sha256_hex, SignedModelManifest, MANIFEST_FILE, SIGNATURE_FILE,
};
use runoff::adapters::gbm::GbmModel;

const KEY_FILE_ENV: &str = "RUNOFF_MODEL_SIGNING_KEY_B64_FILE";

const USAGE: &str = "Usage:
  model_signing keygen --out-seed <path> [--out-pub <path>] [--force]
  model_signing sign <model_path> [--key-file <path>]";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("{flag} needs a value\n{USAGE}"))
}

fn refuse_overwrite(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("Refusing to overwrite existing file {path:?}. Use --force.");
    }
    Ok(())
}

fn write_file(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        opts.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = opts
        .open(path)
        .with_context(|| format!("Failed to open {path:?}"))?;
    file.write_all(contents)?;
    file.write_all(b"\n")?;
    Ok(())
}

fn keygen(mut args: impl Iterator<Item = String>) -> Result<()> {
    let mut out_seed: Option<PathBuf> = None;
    let mut out_pub: Option<PathBuf> = None;
    let mut force = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out-seed" => out_seed = Some(PathBuf::from(next_value(&mut args, &arg)?)),
            "--out-pub" => out_pub = Some(PathBuf::from(next_value(&mut args, &arg)?)),
            "--force" => force = true,
            _ => bail!("Unknown arg: {arg}\n{USAGE}"),
        }
    }
    let out_seed = out_seed.ok_or_else(|| anyhow!("--out-seed is required\n{USAGE}"))?;

    refuse_overwrite(&out_seed, force)?;
    if let Some(pub_path) = &out_pub {
        refuse_overwrite(pub_path, force)?;
    }

    let mut seed = Seed([0u8; 32]);
    OsRng.fill_bytes(&mut seed.0);

    let verifying_key = SigningKey::from_bytes(&seed.0).verifying_key();
    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed.0));
    let pub_b64 = general_purpose::STANDARD.encode(verifying_key.as_bytes());

    write_file(&out_seed, seed_b64.as_bytes(), 0o600)?;
    println!("Wrote signing seed (base64) to {out_seed:?}");

    if let Some(pub_path) = &out_pub {
        // Public key is non-secret; allow read access.
        write_file(pub_path, pub_b64.as_bytes(), 0o644)?;
        println!("Wrote public key (base64) to {pub_path:?}");
    }

    // Print only non-secret material.
    println!("Public key (base64)={pub_b64}");
    println!("Public key (hex)={}", to_hex(verifying_key.as_bytes()));
    Ok(())
}

fn read_seed(path: &Path) -> Result<Seed> {
    let content = Zeroizing::new(
        fs::read_to_string(path).with_context(|| format!("Failed reading signing key {path:?}"))?,
    );
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(content.trim())
            .context("Invalid base64 in signing key")?,
    );
    let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
        anyhow!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        )
    })?;
    Ok(Seed(bytes))
}

fn sign(mut args: impl Iterator<Item = String>) -> Result<()> {
    let mut model_path: Option<PathBuf> = None;
    let mut key_file: Option<PathBuf> = std::env::var(KEY_FILE_ENV).ok().map(PathBuf::from);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--key-file" => key_file = Some(PathBuf::from(next_value(&mut args, &arg)?)),
            _ if model_path.is_none() && !arg.starts_with("--") => {
                model_path = Some(PathBuf::from(arg));
            }
            _ => bail!("Unknown arg: {arg}\n{USAGE}"),
        }
    }

    let model_path = model_path.ok_or_else(|| anyhow!("model path is required\n{USAGE}"))?;
    let key_file = key_file
        .ok_or_else(|| anyhow!("Missing signing key. Pass --key-file or set {KEY_FILE_ENV}."))?;

    let content = fs::read_to_string(&model_path)
        .with_context(|| format!("Failed to read {model_path:?}"))?;
    let model = GbmModel::from_json(&content)
        .with_context(|| format!("Refusing to sign invalid model {model_path:?}"))?;

    let model_name = model_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Model path has no file name"))?
        .to_string();
    let model_dir = model_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let seed = read_seed(&key_file)?;
    let signing_key = SigningKey::from_bytes(&seed.0);

    let mut files = BTreeMap::new();
    files.insert(model_name, sha256_hex(content.as_bytes()));

    let manifest = SignedModelManifest {
        version: 1,
        created_at: Some(chrono::Utc::now().timestamp()),
        files,
    };
    let manifest_bytes =
        serde_json::to_vec_pretty(&manifest).context("Failed to serialize manifest.json")?;

    let manifest_path = model_dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes)
        .with_context(|| format!("Failed to write {manifest_path:?}"))?;

    let sig: Signature = signing_key.sign(&manifest_bytes);
    let sig_path = model_dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, sig.to_bytes())
        .with_context(|| format!("Failed to write {sig_path:?}"))?;

    println!(
        "Validated model ({} trees, attribution={})",
        model.n_trees(),
        model.supports_attribution()
    );
    println!("Signed manifest: {manifest_path:?}");
    println!("Wrote signature: {sig_path:?}");
    println!(
        "Public key (base64)={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );
    Ok(())
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("keygen") => keygen(args),
        Some("sign") => sign(args),
        Some("-h") | Some("--help") => {
            println!("{USAGE}");
            Ok(())
        }
        _ => bail!("{USAGE}"),
    }
}
