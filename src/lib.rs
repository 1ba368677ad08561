//! Secretmatch - AWS Secrets Manager storage for code-signing credentials.
//!
//! Secretmatch lets a "match"-style code-signing tool keep its certificates,
//! private keys and provisioning profiles in AWS Secrets Manager instead of a
//! git repository. Every file of the local working tree becomes one secret
//! named `{prefix}/{relative path}`.
//!
//! # Features
//!
//! - **Working tree mirroring**: download everything under a prefix, upload
//!   or delete single files
//! - **Searchable metadata**: certificates and provisioning profiles are
//!   tagged with their name, app identifier and expiry
//! - **Async/Await**: Built on tokio, with bounded concurrency and cancellation
//! - **Explicit registry**: hosts discover backend types and option schemas
//!   through a [`StorageRegistry`] value
//! - **Feature Flags**: The AWS SDK is only compiled with `aws`
//!
//! # Quick Start
//!
//! ```no_run
//! use secretmatch::{Storage, StorageConfig, StorageRegistry};
//!
//! #[tokio::main]
//! async fn main() -> secretmatch::Result<()> {
//!     let registry = StorageRegistry::with_builtin_backends();
//!
//!     let config = StorageConfig::default()
//!         .with_path_prefix("ios/match")
//!         .with_region("us-west-2")
//!         .with_team_id("AB12CD34EF");
//!     let mut storage = registry.create("secrets_manager", config)?;
//!
//!     // Fetch the whole tree
//!     storage.download().await?;
//!
//!     // Find all development certificates of the team
//!     let certs = storage.list_files("*", "cer").await?;
//!
//!     // Push changes back
//!     let report = storage.upload_files(&certs, None).await?;
//!     println!("{} secrets updated", report.outcomes.len());
//!
//!     storage.clear_changes()?;
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! | Backend | Feature Flag | Notes |
//! |---------|-------------|-------|
//! | `memory` | `mock` (default) | In-memory store for tests |
//! | `secrets_manager` | `aws` (default) | AWS SDK, default credential chain |

pub mod config;
pub mod entry;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod options;
pub mod path;
pub mod registry;
pub mod report;
pub mod storage;
pub mod store;
pub mod sync;
pub mod validation;
pub mod backends;

pub use config::StorageConfig;
pub use entry::{SecretEntry, TagSet};
pub use error::{Result, SecretMatchError};
pub use identity::{TeamIdResolver, TeamLookup};
pub use metadata::{CodeSigningMetadata, MetadataExtractor};
pub use registry::{BackendDescriptor, StorageRegistry};
pub use report::{FileAction, FileOutcome, SyncReport};
pub use storage::{SecretsManagerStorage, Storage};
pub use store::SecretStore;
pub use sync::{SyncState, Synchronizer};
