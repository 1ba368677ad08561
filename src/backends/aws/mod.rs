//! AWS Secrets Manager backend.
//!
//! This backend stores each file of the working tree as a binary secret in
//! AWS Secrets Manager using the official AWS SDK.
//!
//! # Requirements
//!
//! - AWS credentials configured via:
//!   - Environment variables (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`)
//!   - Shared credentials file (`~/.aws/credentials`)
//!   - IAM instance role (for EC2/ECS)
//!
//! # Example
//!
//! ```no_run
//! use secretmatch::{StorageRegistry, StorageConfig};
//!
//! #[tokio::main]
//! async fn main() -> secretmatch::Result<()> {
//!     let registry = StorageRegistry::with_builtin_backends();
//!     let config = StorageConfig::default()
//!         .with_region("us-west-2")
//!         .with_path_prefix("ios/match");
//!
//!     let mut storage = registry.create("secrets_manager", config)?;
//!     storage.download().await?;
//!
//!     Ok(())
//! }
//! ```

mod store;

pub use store::AwsSecretsStore;

use crate::registry::{BackendDescriptor, StorageRegistry};
use crate::storage::SecretsManagerStorage;
use std::sync::Arc;

/// Registry key of the AWS Secrets Manager storage backend.
pub const BACKEND_TYPE: &str = crate::registry::SECRETS_MANAGER;

/// Registers the AWS Secrets Manager backend with `registry`.
pub fn register(registry: &mut StorageRegistry) {
    registry.register(BackendDescriptor {
        type_name: BACKEND_TYPE,
        options: crate::options::secrets_manager_options(),
        encryption: None,
        factory: |cfg| {
            let store = Arc::new(AwsSecretsStore::new(&cfg));
            Ok(Box::new(SecretsManagerStorage::new(cfg, store)))
        },
    });
}
