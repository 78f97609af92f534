//! Model service: Loads the classifier once and hands out shared handles.
//!
//! The first successful load is cached for the lifetime of the service; every
//! later call returns the same `Arc`. A failed load is returned to the caller
//! and not cached, so the next request tries again.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::adapters::gbm::{GbmModel, LoadOptions, ModelLoadError};
use crate::config::AppConfig;

type Loader<M> = Box<dyn Fn() -> Result<M, ModelLoadError> + Send + Sync>;

/// Process-wide holder for a read-only model.
pub struct ModelService<M> {
    loader: Loader<M>,
    model: OnceLock<Arc<M>>,
    /// Serializes loads so the loader runs at most once per success
    init: Mutex<()>,
    loads: AtomicUsize,
}

impl<M> ModelService<M> {
    /// Create a service around a loader. Nothing is loaded until `handle()`.
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<M, ModelLoadError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            model: OnceLock::new(),
            init: Mutex::new(()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Get the shared model, loading it on first use.
    ///
    /// # Errors
    /// Returns the loader's `ModelLoadError` if no model is cached yet and
    /// loading fails.
    pub fn handle(&self) -> Result<Arc<M>, ModelLoadError> {
        if let Some(model) = self.model.get() {
            return Ok(Arc::clone(model));
        }

        // A poisoned lock only means a previous loader panicked; the cache
        // itself is still consistent.
        let _guard = self
            .init
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(model) = self.model.get() {
            return Ok(Arc::clone(model));
        }

        let attempt = self.loads.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!("Loading model (attempt {})", attempt);

        let model = Arc::new((self.loader)()?);
        Ok(Arc::clone(self.model.get_or_init(|| model)))
    }

    /// Whether a model is cached.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Number of times the loader has been invoked.
    #[must_use]
    pub fn load_attempts(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl ModelService<GbmModel> {
    /// Service loading the configured model file.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let path = config.model_path.clone();
        let options = LoadOptions {
            allow_unsigned: config.allow_unsigned_models,
            verifying_key: None,
        };
        let pubkey_file = config.signing_pubkey_file.clone();

        Self::new(move || {
            let mut options = options.clone();
            if let Some(file) = &pubkey_file {
                options.verifying_key =
                    Some(crate::adapters::gbm::manifest::verifying_key_from_file(file)?);
            }
            GbmModel::load(&path, &options)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_returns_same_allocation() {
        let service = ModelService::new(|| Ok(42_u32));

        let a = service.handle().expect("load");
        let b = service.handle().expect("cached");

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, 42);
        assert_eq!(service.load_attempts(), 1);
    }

    #[test]
    fn test_failed_load_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let service = ModelService::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ModelLoadError::InvalidParameter("first attempt".into()))
            } else {
                Ok("model")
            }
        });

        assert!(service.handle().is_err());
        assert!(!service.is_loaded());

        let handle = service.handle().expect("second attempt loads");
        assert_eq!(*handle, "model");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let again = service.handle().expect("cached");
        assert!(Arc::ptr_eq(&handle, &again));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let service = Arc::new(ModelService::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(10));
            Ok(vec![1.0_f64, 2.0])
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || service.handle().expect("load"))
            })
            .collect();
        let models: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(models.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_default_config_loads_signed_fixture() {
        let service = ModelService::from_config(&AppConfig::default());

        let model = service.handle().expect("shipped model verifies with shipped key");
        assert_eq!(model.n_trees(), 3);
        assert!(model.supports_attribution());
    }

    #[test]
    fn test_fixture_rejected_under_other_key() {
        use base64::Engine;
        use ed25519_dalek::SigningKey;

        let temp = tempfile::tempdir().expect("tempdir");
        let pubkey = temp.path().join("other.pub.b64");
        let other = SigningKey::from_bytes(&[9u8; 32]).verifying_key();
        std::fs::write(
            &pubkey,
            base64::engine::general_purpose::STANDARD.encode(other.as_bytes()),
        )
        .expect("write pubkey");

        let config = AppConfig {
            signing_pubkey_file: Some(pubkey),
            ..AppConfig::default()
        };
        let result = ModelService::from_config(&config).handle();
        assert!(matches!(result, Err(ModelLoadError::Signature(_))));
    }
}
