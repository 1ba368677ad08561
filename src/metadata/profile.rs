//! Provisioning profiles (`.mobileprovision`).
//!
//! A profile is a CMS signed envelope around an XML property list. Apple
//! encodes the envelope with indefinite-length BER, which strict DER decoders
//! reject, so the plist is located by its XML markers inside the envelope
//! rather than by decoding the CMS structure.

use super::{AssetInfo, TAG_APP_IDENTIFIER, TAG_APP_ID_NAME, TAG_NAME};
use crate::{Result, SecretMatchError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::time::SystemTime;

const XML_DECLARATION: &[u8] = b"<?xml";
const PLIST_OPEN: &[u8] = b"<plist";
const PLIST_CLOSE: &[u8] = b"</plist>";
const BINARY_PLIST_MAGIC: &[u8] = b"bplist00";

#[derive(Debug, Deserialize)]
struct ProvisioningProfile {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "AppIDName")]
    app_id_name: Option<String>,
    #[serde(rename = "Entitlements", default)]
    entitlements: Entitlements,
    #[serde(rename = "ExpirationDate")]
    expiration_date: Option<plist::Date>,
}

#[derive(Debug, Default, Deserialize)]
struct Entitlements {
    #[serde(rename = "application-identifier")]
    application_identifier: Option<String>,
}

/// Reads name, App ID and expiry from a signed provisioning profile.
pub(crate) fn inspect(file: &Path, contents: &[u8]) -> Result<AssetInfo> {
    let metadata_error = |reason: String| SecretMatchError::Metadata {
        file: file.display().to_string(),
        reason,
    };

    let payload = embedded_plist(contents)
        .ok_or_else(|| metadata_error("no property list found in profile".to_string()))?;
    let profile: ProvisioningProfile = plist::from_bytes(payload)
        .map_err(|e| metadata_error(format!("invalid property list: {e}")))?;

    let mut info = AssetInfo::default();
    let fields = [
        (TAG_NAME, profile.name),
        (TAG_APP_ID_NAME, profile.app_id_name),
        (TAG_APP_IDENTIFIER, profile.entitlements.application_identifier),
    ];
    for (tag, value) in fields {
        if let Some(value) = value {
            info.tags.insert(tag.to_string(), value.trim().to_string());
        }
    }
    info.expiry = profile
        .expiration_date
        .map(|date| DateTime::<Utc>::from(SystemTime::from(date)));

    Ok(info)
}

/// Returns the property list bytes embedded in `contents`.
///
/// Unsigned plists (XML or binary) are returned whole.
fn embedded_plist(contents: &[u8]) -> Option<&[u8]> {
    if contents.starts_with(BINARY_PLIST_MAGIC) {
        return Some(contents);
    }

    let start = find(contents, XML_DECLARATION).or_else(|| find(contents, PLIST_OPEN))?;
    let end = rfind(&contents[start..], PLIST_CLOSE)? + start + PLIST_CLOSE.len();
    Some(&contents[start..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
