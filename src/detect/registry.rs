use std::collections::HashMap;

use crate::detect::backends::{BlobBackend, StubBackend};
use crate::error::{PipelineError, Result};

use super::backend::{DetectorBackend, DetectorOptions};

type BackendFactory =
    Box<dyn Fn(&DetectorOptions) -> Result<Box<dyn DetectorBackend>> + Send + Sync>;

/// Registry of detector backend constructors, keyed by backend name.
///
/// Construction validates the options, so a bad configuration surfaces as
/// `PipelineError::Setup` before any frame is submitted.
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            default_name: None,
        }
    }

    /// Registry with the in-crate backends. `blob` is the default.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("blob", |options| {
            Ok(Box::new(BlobBackend::new(options.clone())?) as Box<dyn DetectorBackend>)
        });
        registry.register("stub", |options| {
            options.validate()?;
            Ok(Box::new(StubBackend::new()) as Box<dyn DetectorBackend>)
        });
        registry
    }

    /// Register a constructor. The first registered backend becomes the default.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&DetectorOptions) -> Result<Box<dyn DetectorBackend>> + Send + Sync + 'static,
    {
        if self.default_name.is_none() {
            self.default_name = Some(name.to_string());
        }
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.factories.contains_key(name) {
            return Err(PipelineError::setup(format!(
                "backend '{}' not registered",
                name
            )));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// Build a backend by name.
    pub fn create(&self, name: &str, options: &DetectorOptions) -> Result<Box<dyn DetectorBackend>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            PipelineError::setup(format!(
                "backend '{}' not registered (available: {})",
                name,
                self.list().join(", ")
            ))
        })?;
        factory(options)
    }

    /// Build the default backend.
    pub fn create_default(&self, options: &DetectorOptions) -> Result<Box<dyn DetectorBackend>> {
        let name = self
            .default_name
            .as_deref()
            .ok_or_else(|| PipelineError::setup("no detector backend registered"))?;
        self.create(name, options)
    }

    /// List registered backends, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_defaults_to_blob() {
        let registry = BackendRegistry::with_builtin();
        assert_eq!(registry.list(), vec!["blob", "stub"]);
        let backend = registry.create_default(&DetectorOptions::default()).unwrap();
        assert_eq!(backend.name(), "blob");
    }

    #[test]
    fn unknown_backend_is_a_setup_error() {
        let registry = BackendRegistry::with_builtin();
        let err = registry
            .create("onnx", &DetectorOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Setup(_)));
        assert!(err.to_string().contains("available: blob, stub"));
    }

    #[test]
    fn invalid_options_fail_for_every_builtin() {
        let registry = BackendRegistry::with_builtin();
        let options = DetectorOptions {
            min_object_size: 2.0,
            ..DetectorOptions::default()
        };
        for name in registry.list() {
            assert!(registry.create(&name, &options).is_err(), "{}", name);
        }
    }

    #[test]
    fn set_default_requires_registration() {
        let mut registry = BackendRegistry::with_builtin();
        assert!(registry.set_default("missing").is_err());
        registry.set_default("stub").unwrap();
        assert_eq!(registry.default_name(), Some("stub"));
    }
}
