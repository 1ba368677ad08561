//! Storage trait exposed to the host and its Secrets Manager implementation.
//!
//! The host drives every storage backend through [`Storage`]: download the
//! whole tree, let the user change files, then upload or delete the changed
//! files and clear the working tree.

use crate::identity::{current_team_id, ConfiguredTeamId, TeamIdResolver};
use crate::report::SyncReport;
use crate::store::SecretStore;
use crate::sync::Synchronizer;
use crate::{Result, StorageConfig};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A storage backend the host can sync a working tree with.
///
/// Implementations must be `Send + Sync`; the host may hold them across
/// await points in a multi-threaded runtime.
#[async_trait]
pub trait Storage: Send + Sync {
    // ========================================================================
    // Metadata
    // ========================================================================

    /// Registry key of this backend (e.g. "secrets_manager").
    fn backend_type(&self) -> &str;

    /// Short description shown to the user.
    fn human_readable_description(&self) -> String;

    /// Whether the host should skip generating its README for this storage.
    fn skip_docs(&self) -> bool;

    // ========================================================================
    // Working tree
    // ========================================================================

    /// Populates the working tree from the store.
    ///
    /// # Errors
    ///
    /// - [`SecretMatchError::Authentication`](crate::SecretMatchError::Authentication):
    ///   credentials missing or expired
    /// - [`SecretMatchError::Cancelled`](crate::SecretMatchError::Cancelled):
    ///   the download was cancelled; calling again resumes it
    async fn download(&mut self) -> Result<()>;

    /// Root of the working tree, once downloaded.
    fn working_directory(&self) -> Option<&Path>;

    /// Team folder inside the working tree the host reads and writes.
    ///
    /// Falls back to a `*` wildcard when no team is known in read-only mode.
    async fn prefixed_working_directory(&self) -> Result<Option<PathBuf>>;

    /// Files of the working tree named `{name_pattern}.{extension}` under the team folder.
    async fn list_files(&self, name_pattern: &str, extension: &str) -> Result<Vec<PathBuf>>;

    /// Removes the working tree.
    fn clear_changes(&mut self) -> Result<()>;

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Uploads changed files. `message` is accepted for parity with
    /// commit-based storages and ignored.
    async fn upload_files(&mut self, files: &[PathBuf], message: Option<&str>)
        -> Result<SyncReport>;

    /// Deletes the secrets of removed files. `message` is ignored.
    async fn delete_files(&mut self, files: &[PathBuf], message: Option<&str>)
        -> Result<SyncReport>;
}

/// Storage backed by AWS Secrets Manager, or any other [`SecretStore`].
///
/// # Example
///
/// ```
/// use secretmatch::backends::memory::MemorySecretStore;
/// use secretmatch::{SecretsManagerStorage, Storage, StorageConfig};
/// use std::sync::Arc;
///
/// let config = StorageConfig::default().with_path_prefix("ios/match");
/// let storage = SecretsManagerStorage::new(config, Arc::new(MemorySecretStore::new()));
///
/// assert_eq!(
///     storage.human_readable_description(),
///     "AWS Secrets Manager Storage [ios/match]"
/// );
/// assert!(storage.skip_docs());
/// ```
pub struct SecretsManagerStorage {
    backend_type: &'static str,
    config: StorageConfig,
    sync: Synchronizer,
    resolver: Arc<dyn TeamIdResolver>,
    team_id: OnceCell<Option<String>>,
    wildcard_warned: AtomicBool,
}

impl SecretsManagerStorage {
    /// Creates a storage around `store`.
    pub fn new(config: StorageConfig, store: Arc<dyn SecretStore>) -> Self {
        info!(
            "Initializing match for {} at {} in {}",
            store.name(),
            config.path_prefix,
            config.region.as_deref().unwrap_or("the default region")
        );

        let sync = Synchronizer::new(store, &config);
        Self {
            backend_type: crate::registry::SECRETS_MANAGER,
            config,
            sync,
            resolver: Arc::new(ConfiguredTeamId),
            team_id: OnceCell::new(),
            wildcard_warned: AtomicBool::new(false),
        }
    }

    /// Creates an AWS-backed storage from the host's options bag.
    ///
    /// # Errors
    ///
    /// Returns [`SecretMatchError::Configuration`](crate::SecretMatchError::Configuration)
    /// if an option has the wrong type.
    #[cfg(feature = "aws")]
    pub fn configure(options: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let config = StorageConfig::from_options(options)?;
        if config.git_url.as_deref().is_some_and(|url| !url.is_empty()) {
            warn!("Looks like you still define a `git_url` somewhere, even though");
            warn!("you use AWS Secrets Manager. You can remove the `git_url`");
            warn!("from your Matchfile and Fastfile");
        }

        let store = Arc::new(crate::backends::aws::AwsSecretsStore::new(&config));
        Ok(Self::new(config, store))
    }

    /// Uses `resolver` to confirm the team id in read-write mode.
    pub fn with_team_resolver(mut self, resolver: Arc<dyn TeamIdResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Uses `token` to cancel transfers.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.sync = self.sync.with_cancellation(token);
        self
    }

    pub(crate) fn with_backend_type(mut self, backend_type: &'static str) -> Self {
        self.backend_type = backend_type;
        self
    }

    /// The configuration this storage was created with.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The synchronizer doing the transfers.
    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    /// Team id in use, resolved once per storage.
    ///
    /// # Errors
    ///
    /// Returns [`SecretMatchError::Configuration`](crate::SecretMatchError::Configuration)
    /// in read-write mode without a team id.
    pub async fn team_id(&self) -> Result<Option<&str>> {
        let team = self
            .team_id
            .get_or_try_init(|| current_team_id(&self.config, self.resolver.as_ref()))
            .await?;

        if team.is_none() && !self.wildcard_warned.swap(true, Ordering::Relaxed) {
            warn!("No team id configured, matching files of every team in the working tree");
        }
        Ok(team.as_deref())
    }
}

#[async_trait]
impl Storage for SecretsManagerStorage {
    fn backend_type(&self) -> &str {
        self.backend_type
    }

    fn human_readable_description(&self) -> String {
        format!("AWS Secrets Manager Storage [{}]", self.config.path_prefix)
    }

    fn skip_docs(&self) -> bool {
        true
    }

    async fn download(&mut self) -> Result<()> {
        self.sync.download().await
    }

    fn working_directory(&self) -> Option<&Path> {
        self.sync.working_directory()
    }

    async fn prefixed_working_directory(&self) -> Result<Option<PathBuf>> {
        let Some(root) = self.sync.working_directory() else {
            return Ok(None);
        };
        let team = self.team_id().await?.unwrap_or("*");
        Ok(Some(root.join(team)))
    }

    async fn list_files(&self, name_pattern: &str, extension: &str) -> Result<Vec<PathBuf>> {
        let team = self.team_id().await?;
        self.sync.list_files(team, name_pattern, extension)
    }

    fn clear_changes(&mut self) -> Result<()> {
        self.sync.clear_changes()
    }

    async fn upload_files(
        &mut self,
        files: &[PathBuf],
        _message: Option<&str>,
    ) -> Result<SyncReport> {
        debug!(files = files.len(), "uploading changed files");
        self.sync.upload_files(files).await
    }

    async fn delete_files(
        &mut self,
        files: &[PathBuf],
        _message: Option<&str>,
    ) -> Result<SyncReport> {
        debug!(files = files.len(), "deleting removed files");
        self.sync.delete_files(files).await
    }
}
