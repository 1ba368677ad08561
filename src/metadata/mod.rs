//! Tag derivation for code signing assets.
//!
//! Each uploaded file gets a few descriptive tags derived from its content so
//! secrets can be identified in the AWS console without downloading them:
//!
//! | Extension | Tags |
//! |-----------|------|
//! | `.cer` | `Name` (subject Common Name), `ExpiresOn` |
//! | `.mobileprovision` | `Name`, `AppIDName`, `AppIdentifier`, `ExpiresOn` |
//! | `.p12` | none |
//!
//! Extraction never fails an upload: malformed content is logged and yields
//! an empty [`TagSet`].

pub mod certificate;
pub mod profile;

use crate::{Result, TagSet};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::warn;

/// Tag holding a human readable name.
pub const TAG_NAME: &str = "Name";
/// Tag holding the App ID name of a provisioning profile.
pub const TAG_APP_ID_NAME: &str = "AppIDName";
/// Tag holding the `application-identifier` entitlement.
pub const TAG_APP_IDENTIFIER: &str = "AppIdentifier";
/// Tag holding the expiry timestamp.
pub const TAG_EXPIRES_ON: &str = "ExpiresOn";

/// Derives tags from a file's content.
///
/// Implementations are pure: they only look at the bytes and the file name.
pub trait MetadataExtractor: Send + Sync {
    /// Returns tags for `contents`, read from a file named `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretMatchError::Metadata`](crate::SecretMatchError::Metadata)
    /// when a recognized format cannot be parsed.
    fn extract(&self, file_name: &Path, contents: &[u8]) -> Result<TagSet>;
}

/// Parser for certificates, private key bundles and provisioning profiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeSigningMetadata;

/// Fields pulled out of a signing asset before being turned into tags.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct AssetInfo {
    pub tags: TagSet,
    pub expiry: Option<DateTime<Utc>>,
}

impl AssetInfo {
    fn into_tags(self) -> TagSet {
        let mut tags = self.tags;
        if let Some(expiry) = self.expiry {
            tags.insert(TAG_EXPIRES_ON.to_string(), format_expiry(&expiry));
        }
        tags
    }
}

impl MetadataExtractor for CodeSigningMetadata {
    fn extract(&self, file_name: &Path, contents: &[u8]) -> Result<TagSet> {
        let extension = file_name.extension().and_then(|e| e.to_str()).unwrap_or("");
        let info = match extension {
            // PKCS#12 bundles need the passphrase before anything useful is visible.
            "p12" => AssetInfo::default(),
            "cer" => certificate::inspect(file_name, contents)?,
            "mobileprovision" => profile::inspect(file_name, contents)?,
            _ => AssetInfo::default(),
        };
        Ok(info.into_tags())
    }
}

/// Reads `path` and derives its tags, failing open.
///
/// Returns an empty set for directories, missing files and unrecognized
/// extensions. Parse failures are logged at warn level.
pub async fn extract_tags(extractor: &dyn MetadataExtractor, path: &Path) -> TagSet {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return TagSet::new(),
    }

    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "could not read file for tagging");
            return TagSet::new();
        }
    };

    match extractor.extract(path, &contents) {
        Ok(tags) => tags,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "skipping secret tags");
            TagSet::new()
        }
    }
}

/// Formats an expiry as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_expiry(expiry: &DateTime<Utc>) -> String {
    expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Drops characters the tag value should not carry.
///
/// Keeps ASCII letters, digits and `_ .:/=+-`.
///
/// ```
/// use secretmatch::metadata::sanitize_tag_value;
///
/// assert_eq!(
///     sanitize_tag_value("Apple Development: Alice (AB12CD34EF)"),
///     "Apple Development: Alice AB12CD34EF"
/// );
/// ```
pub fn sanitize_tag_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "_ .:/=+-".contains(*c))
        .collect()
}
