//! X.509 signing certificates (`.cer`).

use super::{sanitize_tag_value, AssetInfo, TAG_NAME};
use crate::{Result, SecretMatchError};
use chrono::{DateTime, Utc};
use std::path::Path;
use x509_cert::der::asn1::ObjectIdentifier;
use x509_cert::der::{Decode, DecodePem};
use x509_cert::Certificate;

/// id-at-commonName (2.5.4.3)
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

const PEM_MARKER: &[u8] = b"-----BEGIN";

/// Reads the subject Common Name and `notAfter` from a DER or PEM certificate.
pub(crate) fn inspect(file: &Path, contents: &[u8]) -> Result<AssetInfo> {
    let cert = parse(contents).map_err(|reason| SecretMatchError::Metadata {
        file: file.display().to_string(),
        reason,
    })?;

    let mut info = AssetInfo::default();
    if let Some(common_name) = common_name(&cert) {
        info.tags
            .insert(TAG_NAME.to_string(), sanitize_tag_value(&common_name));
    }

    let not_after = cert.tbs_certificate.validity.not_after.to_unix_duration();
    info.expiry = DateTime::<Utc>::from_timestamp(not_after.as_secs() as i64, 0);

    Ok(info)
}

fn parse(contents: &[u8]) -> std::result::Result<Certificate, String> {
    let trimmed = contents
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(contents, |start| &contents[start..]);

    if trimmed.starts_with(PEM_MARKER) {
        Certificate::from_pem(trimmed).map_err(|e| format!("invalid PEM certificate: {e}"))
    } else {
        Certificate::from_der(contents).map_err(|e| format!("invalid DER certificate: {e}"))
    }
}

fn common_name(cert: &Certificate) -> Option<String> {
    cert.tbs_certificate
        .subject
        .0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == COMMON_NAME)
        .map(|atv| String::from_utf8_lossy(atv.value.value()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{CodeSigningMetadata, MetadataExtractor, TAG_EXPIRES_ON};

    const ALICE: &[u8] = include_bytes!("../../tests/fixtures/alice.cer");
    const DEVELOPMENT: &[u8] = include_bytes!("../../tests/fixtures/development.cer");
    const DISTRIBUTION_PEM: &[u8] = include_bytes!("../../tests/fixtures/distribution.pem.cer");

    #[test]
    fn test_der_certificate() {
        let tags = CodeSigningMetadata
            .extract(Path::new("cert.cer"), ALICE)
            .unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[TAG_NAME], "Alice");
        assert_eq!(tags[TAG_EXPIRES_ON], "2030-01-01T00:00:00Z");
    }

    #[test]
    fn test_common_name_is_sanitized() {
        let info = inspect(Path::new("dev.cer"), DEVELOPMENT).unwrap();
        assert_eq!(info.tags[TAG_NAME], "Apple Development: Alice AB12CD34EF");
        assert_eq!(
            info.expiry.map(|e| e.to_rfc3339()),
            Some("2031-06-15T12:30:45+00:00".to_string())
        );
    }

    #[test]
    fn test_pem_certificate() {
        let info = inspect(Path::new("dist.cer"), DISTRIBUTION_PEM).unwrap();
        assert_eq!(info.tags[TAG_NAME], "iPhone Distribution: Example Corp");
        assert!(info.expiry.is_some());
    }

    #[test]
    fn test_garbage_is_an_error() {
        let err = inspect(Path::new("x.cer"), b"\x30\x03abc").unwrap_err();
        assert!(matches!(err, SecretMatchError::Metadata { .. }));
        assert!(err.to_string().contains("x.cer"));
    }
}
