//! Storage backend registry.
//!
//! Hosts build one [`StorageRegistry`] at startup, let each compiled backend
//! register itself, and then ask the registry for backend types, option
//! schemas and new storage instances.

use crate::options::OptionSpec;
use crate::storage::Storage;
use crate::{Result, SecretMatchError, StorageConfig};
use std::collections::BTreeMap;
use tracing::debug;

/// Registry key of the Secrets Manager backend.
pub const SECRETS_MANAGER: &str = "secrets_manager";

/// Factory function type for creating storages.
pub type StorageFactory = fn(StorageConfig) -> Result<Box<dyn Storage>>;

/// Everything the host needs to know about one backend.
#[derive(Clone)]
pub struct BackendDescriptor {
    /// Registry key, also the value users pick as storage mode
    pub type_name: &'static str,
    /// Options the backend reads from the options bag
    pub options: Vec<OptionSpec>,
    /// Encryption backend the host should pair with it; `None` for stores
    /// that encrypt at rest themselves
    pub encryption: Option<&'static str>,
    /// Creates a storage instance
    pub factory: StorageFactory,
}

impl std::fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("type_name", &self.type_name)
            .field("options", &self.options.len())
            .field("encryption", &self.encryption)
            .finish()
    }
}

/// Registered storage backends, keyed by type name.
///
/// # Example
///
/// ```
/// use secretmatch::{Storage, StorageConfig, StorageRegistry};
///
/// let registry = StorageRegistry::with_builtin_backends();
/// assert!(registry.backend_types().contains(&"memory"));
///
/// let storage = registry.create("memory", StorageConfig::default()).unwrap();
/// assert_eq!(storage.backend_type(), "memory");
/// ```
#[derive(Debug, Default)]
pub struct StorageRegistry {
    backends: BTreeMap<&'static str, BackendDescriptor>,
}

impl StorageRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every backend compiled into this crate.
    pub fn with_builtin_backends() -> Self {
        let mut registry = Self::new();
        crate::backends::register_all(&mut registry);
        registry
    }

    /// Registers a backend, replacing any previous one with the same type name.
    pub fn register(&mut self, descriptor: BackendDescriptor) {
        debug!(backend = descriptor.type_name, "registering storage backend");
        self.backends.insert(descriptor.type_name, descriptor);
    }

    /// Looks up a backend by type name.
    pub fn lookup(&self, type_name: &str) -> Option<&BackendDescriptor> {
        self.backends.get(type_name)
    }

    /// Creates a storage of the given type.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The type is not registered (missing feature flag)
    /// - The backend factory fails
    pub fn create(&self, type_name: &str, config: StorageConfig) -> Result<Box<dyn Storage>> {
        let descriptor = self.lookup(type_name).ok_or_else(|| {
            SecretMatchError::Other(anyhow::anyhow!(
                "unknown storage backend: {} (did you enable its feature flag?)",
                type_name
            ))
        })?;

        (descriptor.factory)(config)
    }

    /// Registered type names, sorted.
    pub fn backend_types(&self) -> Vec<&'static str> {
        self.backends.keys().copied().collect()
    }

    /// Options of one backend.
    pub fn option_schema(&self, type_name: &str) -> Option<&[OptionSpec]> {
        self.lookup(type_name).map(|d| d.options.as_slice())
    }

    /// Options of every backend, in type name order.
    pub fn all_options(&self) -> Vec<&OptionSpec> {
        self.backends.values().flat_map(|d| d.options.iter()).collect()
    }

    /// Encryption backend to pair with a storage type.
    ///
    /// `None` means the storage needs no extra encryption layer, or the type
    /// is unknown.
    pub fn encryption_backend(&self, type_name: &str) -> Option<&'static str> {
        self.lookup(type_name).and_then(|d| d.encryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionType;

    fn failing_factory(_cfg: StorageConfig) -> Result<Box<dyn Storage>> {
        Err(SecretMatchError::Configuration("test factory".to_string()))
    }

    fn descriptor(type_name: &'static str, encryption: Option<&'static str>) -> BackendDescriptor {
        BackendDescriptor {
            type_name,
            options: vec![OptionSpec {
                key: "test_option",
                env_name: "TEST_OPTION",
                description: "test",
                optional: true,
                value_type: OptionType::String,
            }],
            encryption,
            factory: failing_factory,
        }
    }

    #[test]
    fn test_backend_registration() {
        let mut registry = StorageRegistry::new();
        registry.register(descriptor("s3", Some("openssl")));
        registry.register(descriptor("git", Some("openssl")));

        assert_eq!(registry.backend_types(), vec!["git", "s3"]);
        assert_eq!(registry.encryption_backend("s3"), Some("openssl"));
        assert_eq!(registry.option_schema("git").unwrap().len(), 1);
        assert_eq!(registry.all_options().len(), 2);
    }

    #[test]
    fn test_unknown_backend_error() {
        let registry = StorageRegistry::new();
        let err = registry
            .create("secrets_manager", StorageConfig::default())
            .err()
            .unwrap();

        let err_msg = err.to_string();
        assert!(err_msg.contains("unknown storage backend"));
        assert!(err_msg.contains("feature flag"));
        assert!(registry.option_schema("secrets_manager").is_none());
        assert_eq!(registry.encryption_backend("secrets_manager"), None);
    }

    #[test]
    fn test_factory_errors_propagate() {
        let mut registry = StorageRegistry::new();
        registry.register(descriptor("broken", None));

        let result = registry.create("broken", StorageConfig::default());
        assert!(matches!(result, Err(SecretMatchError::Configuration(_))));
    }

    #[cfg(feature = "aws")]
    #[test]
    fn test_builtin_secrets_manager() {
        let registry = StorageRegistry::with_builtin_backends();
        assert!(registry.lookup(SECRETS_MANAGER).is_some());
        assert_eq!(registry.encryption_backend(SECRETS_MANAGER), None);

        let keys: Vec<_> = registry
            .option_schema(SECRETS_MANAGER)
            .unwrap()
            .iter()
            .map(|o| o.key)
            .collect();
        assert!(keys.contains(&"secrets_manager_path_prefix"));
        assert!(keys.contains(&"secrets_manager_tags"));
        assert!(keys.contains(&"secrets_manager_region"));
    }
}
