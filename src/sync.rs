//! Mirroring a local working tree into a secret store.
//!
//! A [`Synchronizer`] owns one session: it downloads every secret under the
//! configured prefix into a fresh temporary directory, then uploads or deletes
//! individual files of that directory on request.
//!
//! ```text
//! Idle -> Downloading -> Ready -> {Uploading, Deleting}* -> Idle
//! ```
//!
//! Listing pages are fetched strictly one after another. Per-file transfers
//! fan out up to the configured concurrency. Authentication failures and
//! cancellation abort whatever is still in flight.

use crate::entry::merge_tags;
use crate::metadata::{extract_tags, CodeSigningMetadata, MetadataExtractor};
use crate::path::{strip_remote_prefix, to_remote_key, SEPARATOR};
use crate::report::{FileAction, FileOutcome, SyncReport};
use crate::store::{SecretStore, DEFAULT_RECOVERY_WINDOW_DAYS};
use crate::{Result, SecretMatchError, StorageConfig, TagSet};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Name prefix of files still being written during a download.
const INCOMPLETE_PREFIX: &str = ".secretmatch-";

#[derive(Debug, Clone, Copy)]
enum BatchOp {
    Upload,
    Delete,
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No download has completed
    Idle,
    /// Listing and fetching secrets
    Downloading,
    /// Working tree is populated
    Ready,
    /// Upload batch in progress
    Uploading,
    /// Delete batch in progress
    Deleting,
}

/// Mirrors secrets under a path prefix into a local working tree and back.
///
/// # Example
///
/// ```
/// use secretmatch::backends::memory::MemorySecretStore;
/// use secretmatch::{StorageConfig, Synchronizer};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> secretmatch::Result<()> {
///     let store = MemorySecretStore::new();
///     store.insert("match/certs/development/ABC.cer", b"cert".to_vec()).await;
///
///     let config = StorageConfig::default().with_path_prefix("match");
///     let mut sync = Synchronizer::new(Arc::new(store), &config);
///     sync.download().await?;
///
///     let root = sync.working_directory().unwrap();
///     assert!(root.join("certs/development/ABC.cer").is_file());
///     Ok(())
/// }
/// ```
pub struct Synchronizer {
    store: Arc<dyn SecretStore>,
    extractor: Arc<dyn MetadataExtractor>,
    path_prefix: String,
    global_tags: TagSet,
    concurrency: usize,
    cancel: CancellationToken,
    working_tree: Option<TempDir>,
    materialized: HashSet<String>,
    downloaded: bool,
    state: SyncState,
}

impl Synchronizer {
    /// Creates an idle session for `store`.
    pub fn new(store: Arc<dyn SecretStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            extractor: Arc::new(CodeSigningMetadata),
            path_prefix: config.path_prefix.clone(),
            global_tags: config.tags.clone(),
            concurrency: config.concurrency.max(1),
            cancel: CancellationToken::new(),
            working_tree: None,
            materialized: HashSet::new(),
            downloaded: false,
            state: SyncState::Idle,
        }
    }

    /// Replaces the tag extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Uses `token` to cancel in-flight work.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Replaces a fired token so an interrupted download can be resumed.
    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    /// Token that cancels this session's in-flight work when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Prefix all remote keys of this session start with.
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// Root of the working tree, once `download()` created it.
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_tree.as_ref().map(TempDir::path)
    }

    /// Fetches every secret under the prefix into the working tree.
    ///
    /// A second call after a successful download is a no-op. After an
    /// interrupted download (cancellation or error) the next call reuses the
    /// working tree and only fetches the secrets that are still missing.
    ///
    /// # Errors
    ///
    /// - [`SecretMatchError::Authentication`]: credentials missing or expired
    /// - [`SecretMatchError::Cancelled`]: the cancellation token fired
    pub async fn download(&mut self) -> Result<()> {
        if self.downloaded {
            debug!("working tree already downloaded, skipping");
            return Ok(());
        }

        self.state = SyncState::Downloading;
        let result = self.fetch_all().await;
        match &result {
            Ok(()) => {
                self.downloaded = true;
                self.state = SyncState::Ready;
                if let Some(root) = self.working_directory() {
                    info!(
                        secrets = self.materialized.len(),
                        "successfully downloaded all secrets to {}",
                        root.display()
                    );
                }
            }
            Err(e) => {
                self.state = SyncState::Idle;
                if e.is_authentication() {
                    error!("{} authentication error: {}", self.store.name(), e);
                }
            }
        }
        result
    }

    async fn fetch_all(&mut self) -> Result<()> {
        let tree = match self.working_tree.take() {
            Some(tree) => tree,
            None => tempfile::Builder::new().prefix("secretmatch-").tempdir()?,
        };
        let root = tree.path().to_path_buf();
        self.working_tree = Some(tree);

        if self.path_prefix.is_empty() {
            warn!("no path prefix configured, downloading every secret in the account");
        }

        let keys = self.list_all_keys().await?;
        let pending: Vec<(String, PathBuf)> = keys
            .into_iter()
            .filter(|key| !self.materialized.contains(key))
            .filter_map(|key| {
                let local = self.local_path(&root, &key)?;
                Some((key, local))
            })
            .collect();

        debug!(pending = pending.len(), "fetching secrets");

        let store = &self.store;
        let cancel = &self.cancel;
        let mut fetched = stream::iter(pending)
            .map(|(key, local)| async move {
                if cancel.is_cancelled() {
                    return Err(SecretMatchError::Cancelled);
                }
                let payload = store.get_secret_value(&key).await?;
                write_atomically(&local, &payload).await?;
                Ok::<_, SecretMatchError>(key)
            })
            .buffer_unordered(self.concurrency);

        let mut completed = Vec::new();
        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(SecretMatchError::Cancelled),
                next = fetched.next() => next,
            };
            match next {
                Some(Ok(key)) => completed.push(key),
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            }
        };
        drop(fetched);

        self.materialized.extend(completed);
        outcome
    }

    async fn list_all_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(SecretMatchError::Cancelled),
                page = self.store.list_secrets(&self.path_prefix, cursor.as_deref()) => page?,
            };
            keys.extend(page.keys);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(keys)
    }

    /// Local file a remote key materializes to, or `None` if the key must be skipped.
    fn local_path(&self, root: &Path, key: &str) -> Option<PathBuf> {
        let Some(relative) = strip_remote_prefix(key, &self.path_prefix) else {
            warn!(key = %key, prefix = %self.path_prefix, "listed secret is outside the path prefix, skipping");
            return None;
        };

        let relative = Path::new(relative.trim_start_matches(SEPARATOR));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            warn!(key = %key, "secret name does not map into the working tree, skipping");
            return None;
        }

        Some(root.join(relative))
    }

    /// Uploads files of the working tree, creating or updating their secrets.
    ///
    /// Existing secrets get their payload replaced and, when the file yields
    /// tags, those tags merged in. Configured global tags are only applied
    /// when a secret is created.
    ///
    /// # Errors
    ///
    /// - [`SecretMatchError::NotDownloaded`]: no working tree yet
    /// - [`SecretMatchError::Authentication`]: aborts the remaining files
    /// - [`SecretMatchError::BatchCancelled`]: the cancellation token fired;
    ///   carries the outcomes of the files that finished
    ///
    /// Other failures are recorded per file in the returned report.
    pub async fn upload_files(&mut self, files: &[PathBuf]) -> Result<SyncReport> {
        let root = self.require_working_tree()?;
        self.state = SyncState::Uploading;
        let result = self.run_batch(BatchOp::Upload, &root, files).await;
        self.state = SyncState::Ready;
        result
    }

    /// Schedules the secrets of working tree files for deletion.
    ///
    /// Secrets that are already gone count as success
    /// ([`FileAction::AlreadyAbsent`]). Local files are left in place.
    ///
    /// # Errors
    ///
    /// Same as [`upload_files`](Self::upload_files).
    pub async fn delete_files(&mut self, files: &[PathBuf]) -> Result<SyncReport> {
        let root = self.require_working_tree()?;
        self.state = SyncState::Deleting;
        let result = self.run_batch(BatchOp::Delete, &root, files).await;
        self.state = SyncState::Ready;
        result
    }

    /// Runs `op` for every file, keeping caller order in the report.
    ///
    /// On cancellation the outcomes collected so far are returned inside
    /// [`SecretMatchError::BatchCancelled`].
    async fn run_batch(&self, op: BatchOp, root: &Path, files: &[PathBuf]) -> Result<SyncReport> {
        let cancel = &self.cancel;
        let mut outcomes = stream::iter(files.iter().cloned())
            .map(|file: PathBuf| async move {
                if cancel.is_cancelled() {
                    return (file, None, Err(SecretMatchError::Cancelled));
                }
                let (remote_key, result) = self.process(op, root, &file).await;
                (file, remote_key, result)
            })
            .buffered(self.concurrency);

        let mut report = SyncReport::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = outcomes.next() => Some(next),
            };
            let Some(next) = next else {
                return Err(SecretMatchError::BatchCancelled { completed: report });
            };
            let Some((file, remote_key, result)) = next else {
                break;
            };

            let result = match result {
                Err(e) if e.is_authentication() => {
                    error!("{} authentication error: {}", self.store.name(), e);
                    return Err(e);
                }
                Err(e) if e.is_cancelled() => {
                    return Err(SecretMatchError::BatchCancelled { completed: report });
                }
                other => other,
            };
            if let Err(e) = &result {
                warn!(file = %file.display(), error = %e, "{:?} failed", op);
            }

            report.outcomes.push(FileOutcome {
                path: file,
                remote_key,
                result,
            });
        }

        Ok(report)
    }

    async fn process(
        &self,
        op: BatchOp,
        root: &Path,
        file: &Path,
    ) -> (Option<String>, Result<FileAction>) {
        let secret_name = match relative_name(root, file) {
            Ok(name) => name,
            Err(e) => return (None, Err(e)),
        };
        let key = to_remote_key(&self.path_prefix, &secret_name);

        let result = match op {
            BatchOp::Upload => {
                debug!(secret = %secret_name, "uploading to {}", self.store.name());
                self.create_or_update(&key, file).await
            }
            BatchOp::Delete => self.delete(&key, &secret_name).await,
        };
        (Some(key), result)
    }

    async fn create_or_update(&self, key: &str, file: &Path) -> Result<FileAction> {
        let secret_specific_tags = extract_tags(self.extractor.as_ref(), file).await;
        let payload = tokio::fs::read(file).await?;

        if self.store.secret_exists(key).await? {
            debug!(key = %key, "secret already exists, updating");
            self.store.put_secret_value(key, &payload).await?;
            if !secret_specific_tags.is_empty() {
                self.store.tag_resource(key, &secret_specific_tags).await?;
            }
            Ok(FileAction::Updated)
        } else {
            debug!(key = %key, "secret doesn't exist, creating");
            let tags = merge_tags(&self.global_tags, &secret_specific_tags);
            self.store.create_secret(key, &payload, &tags).await?;
            Ok(FileAction::Created)
        }
    }

    async fn delete(&self, key: &str, secret_name: &str) -> Result<FileAction> {
        match self
            .store
            .delete_secret(key, DEFAULT_RECOVERY_WINDOW_DAYS)
            .await
        {
            Ok(()) => Ok(FileAction::Deleted),
            Err(e) if e.is_not_found() => {
                debug!(secret = %secret_name, "secret doesn't exist, skipping");
                Ok(FileAction::AlreadyAbsent)
            }
            Err(e) => Err(e),
        }
    }

    /// Files in the working tree matching `{team_id}/**/{name_pattern}.{extension}`.
    ///
    /// `team_id` of `None` matches every team. Only looks at the local tree.
    ///
    /// # Errors
    ///
    /// Returns [`SecretMatchError::NotDownloaded`] before the first download.
    pub fn list_files(
        &self,
        team_id: Option<&str>,
        name_pattern: &str,
        extension: &str,
    ) -> Result<Vec<PathBuf>> {
        let root = self.require_working_tree()?;
        let root = root.to_str().ok_or_else(|| {
            SecretMatchError::Other(anyhow::anyhow!(
                "working tree path is not valid UTF-8: {}",
                root.display()
            ))
        })?;

        let pattern = format!(
            "{}/{}/**/{}.{}",
            glob::Pattern::escape(root),
            team_id.unwrap_or("*"),
            name_pattern,
            extension
        );

        let mut files = Vec::new();
        for entry in glob::glob(&pattern)? {
            files.push(entry.map_err(|e| SecretMatchError::Io(e.into_error()))?);
        }
        files.sort();
        Ok(files)
    }

    /// Deletes the working tree and returns to [`SyncState::Idle`].
    pub fn clear_changes(&mut self) -> Result<()> {
        if let Some(tree) = self.working_tree.take() {
            debug!(path = %tree.path().display(), "removing working tree");
            tree.close()?;
        }
        self.materialized.clear();
        self.downloaded = false;
        self.state = SyncState::Idle;
        Ok(())
    }

    fn require_working_tree(&self) -> Result<PathBuf> {
        self.working_directory()
            .map(Path::to_path_buf)
            .ok_or(SecretMatchError::NotDownloaded)
    }
}

/// Path of `file` relative to the working tree, with `/` separators.
fn relative_name(root: &Path, file: &Path) -> Result<String> {
    let relative = file
        .strip_prefix(root)
        .map_err(|_| SecretMatchError::OutsideWorkingTree(file.display().to_string()))?;

    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        return Err(SecretMatchError::OutsideWorkingTree(file.display().to_string()));
    }
    Ok(parts.join("/"))
}

/// Writes `payload` to a uniquely named sibling of `path` and renames it into place.
async fn write_atomically(path: &Path, payload: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| SecretMatchError::OutsideWorkingTree(path.display().to_string()))?;
    tokio::fs::create_dir_all(parent).await?;

    let incomplete = tempfile::Builder::new()
        .prefix(INCOMPLETE_PREFIX)
        .tempfile_in(parent)?
        .into_temp_path();
    tokio::fs::write(&incomplete, payload).await?;
    incomplete.persist(path).map_err(|e| e.error)?;
    Ok(())
}
