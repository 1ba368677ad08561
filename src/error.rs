//! Error types for secretmatch operations.

use crate::report::SyncReport;
use thiserror::Error;

/// Result type alias using [`SecretMatchError`].
pub type Result<T> = std::result::Result<T, SecretMatchError>;

/// Remediation text attached to authentication failures against AWS.
pub const AWS_CREDENTIALS_HINT: &str = "Note: AWS credentials are passed via environment \
variables or the shared credentials file. The AWS SDK documentation explains which variables \
are expected: https://docs.aws.amazon.com/sdkref/latest/guide/environment-variables.html";

/// Errors that can occur while synchronizing with a secret store.
///
/// All errors implement `std::error::Error` and can be chained with `source()`.
#[derive(Debug, Error)]
pub enum SecretMatchError {
    /// Secret was not found in the store.
    #[error("secret not found: {0}")]
    NotFound(String),

    /// Secret already exists (cannot create duplicate).
    #[error("secret already exists: {0}")]
    AlreadyExists(String),

    /// Credentials are missing, expired or rejected by the store.
    #[error("authentication failed: {message}\n\n{hint}")]
    Authentication {
        /// What the store reported
        message: String,
        /// How the user can fix their credentials
        hint: String,
    },

    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Secret name would be rejected by the store.
    #[error("invalid secret name: {0}")]
    InvalidSecretName(String),

    /// The working tree has not been populated by `download()` yet.
    #[error("working tree not available: call download() first")]
    NotDownloaded,

    /// A file handed to upload or delete does not live in the working tree.
    #[error("{0} is not inside the working tree")]
    OutsideWorkingTree(String),

    /// Certificate or profile metadata could not be parsed.
    #[error("metadata extraction failed for {file}: {reason}")]
    Metadata {
        /// File being inspected
        file: String,
        /// Parser error
        reason: String,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// An upload or delete batch was cancelled part way through.
    ///
    /// `completed` holds the files that finished before the token fired;
    /// the remaining files can be submitted again.
    #[error("operation cancelled after {} file(s)", .completed.outcomes.len())]
    BatchCancelled {
        /// Outcomes of the files that finished
        completed: SyncReport,
    },

    /// Operation is not supported by this backend.
    #[error("operation not supported by backend: {0}")]
    NotSupported(String),

    /// Store operation failed with context.
    #[error("{backend}: {operation} {key}: {source}")]
    StoreOperation {
        /// Backend name
        backend: String,
        /// Operation name (list_secrets, create_secret, ...)
        operation: String,
        /// Remote key
        key: String,
        /// Underlying error
        #[source]
        source: Box<SecretMatchError>,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Glob pattern could not be compiled.
    #[error("invalid file pattern: {0}")]
    Glob(#[from] glob::PatternError),

    /// Other error (catch-all).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SecretMatchError {
    /// Creates a store operation error with context.
    ///
    /// # Example
    ///
    /// ```
    /// use secretmatch::SecretMatchError;
    ///
    /// let err = SecretMatchError::NotFound("match/certs/dev.cer".to_string());
    /// let wrapped = SecretMatchError::store_op(
    ///     "awssecrets",
    ///     "get_secret_value",
    ///     "match/certs/dev.cer",
    ///     err,
    /// );
    ///
    /// assert_eq!(
    ///     wrapped.to_string(),
    ///     "awssecrets: get_secret_value match/certs/dev.cer: secret not found: match/certs/dev.cer"
    /// );
    /// assert!(wrapped.is_not_found());
    /// ```
    pub fn store_op(
        backend: impl Into<String>,
        operation: impl Into<String>,
        key: impl Into<String>,
        err: SecretMatchError,
    ) -> Self {
        Self::StoreOperation {
            backend: backend.into(),
            operation: operation.into(),
            key: key.into(),
            source: Box::new(err),
        }
    }

    /// Creates an authentication error carrying the AWS remediation hint.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            hint: AWS_CREDENTIALS_HINT.to_string(),
        }
    }

    /// Returns the innermost error, looking through [`StoreOperation`](Self::StoreOperation).
    pub fn root(&self) -> &SecretMatchError {
        match self {
            Self::StoreOperation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error means the secret does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound(_))
    }

    /// Whether this error is an authentication failure.
    ///
    /// Authentication failures abort whole batches instead of being recorded per file.
    pub fn is_authentication(&self) -> bool {
        matches!(self.root(), Self::Authentication { .. })
    }

    /// Whether this error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled | Self::BatchCancelled { .. })
    }
}
