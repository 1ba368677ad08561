//! Mapping between working tree paths and remote secret keys.
//!
//! Remote keys are `"{prefix}/{relative path}"`. Paths handed in by callers are
//! trusted: `..` and duplicate separators are passed through untouched.

/// Separator used in remote keys and relative paths.
pub const SEPARATOR: char = '/';

/// Builds the remote key for a path relative to the working tree.
///
/// A single separator is inserted between prefix and path unless the path
/// already starts with one.
///
/// ```
/// use secretmatch::path::to_remote_key;
///
/// assert_eq!(to_remote_key("match", "certs/dev.cer"), "match/certs/dev.cer");
/// assert_eq!(to_remote_key("match", "/certs/dev.cer"), "match/certs/dev.cer");
/// ```
pub fn to_remote_key(prefix: &str, local_relative_path: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + local_relative_path.len() + 1);
    key.push_str(prefix);
    if !local_relative_path.starts_with(SEPARATOR) {
        key.push(SEPARATOR);
    }
    key.push_str(local_relative_path);
    key
}

/// Recovers the working tree relative path from a remote key.
///
/// Removes one leading occurrence of `prefix` as a plain string, then at most
/// one separator. Keys that do not start with `prefix` are returned unchanged.
/// The match is literal, so `match2/a.cer` under `match` becomes `2/a.cer`;
/// use [`strip_remote_prefix`] when the prefix must end at a separator.
///
/// ```
/// use secretmatch::path::to_local_relative_path;
///
/// assert_eq!(to_local_relative_path("match/certs/dev.cer", "match"), "certs/dev.cer");
/// assert_eq!(to_local_relative_path("other/dev.cer", "match"), "other/dev.cer");
/// assert_eq!(to_local_relative_path("match2/dev.cer", "match"), "2/dev.cer");
/// ```
pub fn to_local_relative_path(remote_key: &str, prefix: &str) -> String {
    match remote_key.strip_prefix(prefix) {
        Some(rest) => rest.strip_prefix(SEPARATOR).unwrap_or(rest).to_string(),
        None => remote_key.to_string(),
    }
}

/// Boundary-aware form of [`to_local_relative_path`]: `None` when the key is not under `prefix`.
///
/// The prefix must end at a separator, so `match2/a.cer` is not under `match`.
pub fn strip_remote_prefix(remote_key: &str, prefix: &str) -> Option<String> {
    let rest = remote_key.strip_prefix(prefix)?;
    if let Some(relative) = rest.strip_prefix(SEPARATOR) {
        return Some(relative.to_string());
    }
    if rest.is_empty() || prefix.is_empty() || prefix.ends_with(SEPARATOR) {
        return Some(rest.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_inserted_once() {
        assert_eq!(to_remote_key("match", "a.cer"), "match/a.cer");
        assert_eq!(to_remote_key("match", "/a.cer"), "match/a.cer");
        assert_eq!(to_remote_key("", "a.cer"), "/a.cer");
    }

    #[test]
    fn test_no_normalization() {
        assert_eq!(to_remote_key("match/", "a.cer"), "match//a.cer");
        assert_eq!(to_remote_key("match", "../a.cer"), "match/../a.cer");
        assert_eq!(to_remote_key("match", "certs//a.cer"), "match/certs//a.cer");
    }

    #[test]
    fn test_round_trip() {
        let prefixes = ["match", "", "team/match", "match/", "ios-signing"];
        let paths = [
            "a.cer",
            "certs/development/ABC.cer",
            "profiles/appstore/AppStore_com.example.mobileprovision",
            "nested//double.p12",
            "../escape.cer",
        ];

        for prefix in prefixes {
            for path in paths {
                let key = to_remote_key(prefix, path);
                assert!(key.starts_with(prefix));
                assert_eq!(
                    to_local_relative_path(&key, prefix),
                    path,
                    "prefix={prefix:?} path={path:?}"
                );
            }
        }
    }

    #[test]
    fn test_prefix_removed_once() {
        assert_eq!(to_local_relative_path("match/match/a.cer", "match"), "match/a.cer");
    }

    #[test]
    fn test_prefix_mismatch() {
        assert_eq!(to_local_relative_path("Match/a.cer", "match"), "Match/a.cer");
        assert_eq!(strip_remote_prefix("Match/a.cer", "match"), None);
        assert_eq!(strip_remote_prefix("match/a.cer", "match").as_deref(), Some("a.cer"));
    }

    #[test]
    fn test_neighbouring_prefix() {
        assert_eq!(strip_remote_prefix("match2/a.cer", "match"), None);
        assert_eq!(to_local_relative_path("match2/a.cer", "match"), "2/a.cer");
        assert_eq!(to_local_relative_path("matches.cer", "match"), "es.cer");
        assert_eq!(strip_remote_prefix("match/a.cer", "match/").as_deref(), Some("a.cer"));
    }
}
