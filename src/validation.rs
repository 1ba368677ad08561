//! Secret name validation.
//!
//! AWS Secrets Manager rejects names outside a small character set. Checking
//! locally turns a late service error into a clear per-file failure.

use crate::{Result, SecretMatchError};

/// Punctuation allowed in secret names besides ASCII letters and digits.
const ALLOWED_PUNCTUATION: &str = "/_+=.@-";

/// Maximum allowed length for secret names.
const MAX_NAME_LENGTH: usize = 512;

/// Validates a remote secret key.
///
/// # Errors
///
/// Returns [`SecretMatchError::InvalidSecretName`] if the key is empty, too
/// long, or contains characters the store does not accept.
///
/// # Example
///
/// ```
/// use secretmatch::validation::validate_secret_name;
///
/// assert!(validate_secret_name("match/certs/development/ABC123.cer").is_ok());
/// assert!(validate_secret_name("match/profiles/appstore/AppStore_com.example.mobileprovision").is_ok());
///
/// assert!(validate_secret_name("").is_err());
/// assert!(validate_secret_name("match/with space.cer").is_err());
/// ```
pub fn validate_secret_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SecretMatchError::InvalidSecretName(
            "name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(SecretMatchError::InvalidSecretName(format!(
            "name exceeds maximum length of {} characters",
            MAX_NAME_LENGTH
        )));
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !ALLOWED_PUNCTUATION.contains(*c))
    {
        return Err(SecretMatchError::InvalidSecretName(format!(
            "{name:?} contains {bad:?} (allowed: letters, digits and {ALLOWED_PUNCTUATION})"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_secret_name("match/certs/distribution/XYZ.p12").is_ok());
        assert!(validate_secret_name("ios+signing=prod@team.a-b_c").is_ok());
        assert!(validate_secret_name("/leading/slash").is_ok());
    }

    #[test]
    fn test_empty_name() {
        let result = validate_secret_name("");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_too_long() {
        let long_name = "a".repeat(513);
        let result = validate_secret_name(&long_name);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("maximum length"));

        assert!(validate_secret_name(&"a".repeat(512)).is_ok());
    }

    #[test]
    fn test_rejected_characters() {
        let rejected = vec![
            "match/a b.cer",
            "match/a*.cer",
            "match/a\0.cer",
            "match/a\n.cer",
            "match/(x).cer",
            "match/ümlaut.cer",
        ];

        for name in rejected {
            let result = validate_secret_name(name);
            assert!(result.is_err(), "Expected {:?} to fail validation", name);
            assert!(matches!(
                result.unwrap_err(),
                SecretMatchError::InvalidSecretName(_)
            ));
        }
    }
}
