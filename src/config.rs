//! Runtime configuration from environment variables.

use std::path::PathBuf;

pub const MODEL_PATH_ENV: &str = "RUNOFF_MODEL_PATH";
pub const ALLOW_UNSIGNED_MODELS_ENV: &str = "RUNOFF_ALLOW_UNSIGNED_MODELS";
pub const PUBKEY_FILE_ENV: &str = "RUNOFF_MODEL_SIGNING_PUBKEY_B64_FILE";
pub const LOG_MODE_ENV: &str = "RUNOFF_LOG_MODE";
pub const LOG_FILE_ENV: &str = "RUNOFF_LOG_FILE";

const DEFAULT_MODEL_PATH: &str = "models/gbm.json";
const DEFAULT_LOG_FILE: &str = "runoff.log";
const DEFAULT_PUBKEY_FILE: &str = "models/signing.pub.b64";

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    /// File when stdout is a terminal (the TUI owns it), stdout otherwise
    #[default]
    Auto,
    File,
    Stdout,
}

impl LogMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "file" => Some(Self::File),
            "stdout" => Some(Self::Stdout),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub model_path: PathBuf,
    /// Honored in debug builds only
    pub allow_unsigned_models: bool,
    pub signing_pubkey_file: Option<PathBuf>,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            allow_unsigned_models: false,
            signing_pubkey_file: Some(PathBuf::from(DEFAULT_PUBKEY_FILE)),
            log_mode: LogMode::Auto,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "yes" | "YES")
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl AppConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unset or empty values use defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(non_empty);
        let defaults = Self::default();

        let log_mode = match get(LOG_MODE_ENV) {
            Some(raw) => LogMode::parse(&raw).unwrap_or_else(|| {
                // Logging is not set up yet.
                eprintln!("Ignoring unknown {LOG_MODE_ENV}={raw:?}; using auto");
                LogMode::Auto
            }),
            None => defaults.log_mode,
        };

        Self {
            model_path: get(MODEL_PATH_ENV).map_or(defaults.model_path, PathBuf::from),
            allow_unsigned_models: get(ALLOW_UNSIGNED_MODELS_ENV).is_some_and(|v| parse_bool(&v)),
            signing_pubkey_file: get(PUBKEY_FILE_ENV)
                .map(PathBuf::from)
                .or(defaults.signing_pubkey_file),
            log_mode,
            log_file: get(LOG_FILE_ENV).map_or(defaults.log_file, PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.model_path, PathBuf::from("models/gbm.json"));
        assert_eq!(config.log_file, PathBuf::from("runoff.log"));
        assert_eq!(config.log_mode, LogMode::Auto);
        assert!(!config.allow_unsigned_models);
        assert_eq!(
            config.signing_pubkey_file,
            Some(PathBuf::from("models/signing.pub.b64"))
        );
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (MODEL_PATH_ENV, "/opt/models/runoff.json"),
            (ALLOW_UNSIGNED_MODELS_ENV, "yes"),
            (PUBKEY_FILE_ENV, " /run/secrets/pubkey "),
            (LOG_MODE_ENV, "Stdout"),
            (LOG_FILE_ENV, "/var/log/runoff.log"),
        ]));

        assert_eq!(config.model_path, PathBuf::from("/opt/models/runoff.json"));
        assert!(config.allow_unsigned_models);
        assert_eq!(
            config.signing_pubkey_file,
            Some(PathBuf::from("/run/secrets/pubkey"))
        );
        assert_eq!(config.log_mode, LogMode::Stdout);
        assert_eq!(config.log_file, PathBuf::from("/var/log/runoff.log"));
    }

    #[test]
    fn test_invalid_and_empty_values_fall_back() {
        let config = AppConfig::from_lookup(lookup(&[
            (MODEL_PATH_ENV, "  "),
            (ALLOW_UNSIGNED_MODELS_ENV, "maybe"),
            (LOG_MODE_ENV, "syslog"),
        ]));

        assert_eq!(config.model_path, PathBuf::from("models/gbm.json"));
        assert!(!config.allow_unsigned_models);
        assert_eq!(config.log_mode, LogMode::Auto);
    }
}
