//! Configuration for the secrets manager storage backend.

use crate::options::{ENV_AWS_REGION, ENV_CONCURRENCY, ENV_ENDPOINT, ENV_PATH_PREFIX, ENV_REGION, ENV_TAGS};
use crate::{Result, SecretMatchError, TagSet};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Storage configuration.
///
/// Use the builder pattern for ergonomic configuration:
///
/// ```
/// use secretmatch::StorageConfig;
///
/// let config = StorageConfig::default()
///     .with_path_prefix("ios/match")
///     .with_region("us-west-2")
///     .with_tag("Team", "mobile")
///     .with_team_id("AB12CD34EF");
///
/// assert_eq!(config.path_prefix, "ios/match");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// Prefix for every secret name (default: empty)
    pub path_prefix: String,

    /// Tags added to newly created secrets
    pub tags: TagSet,

    /// AWS region; `None` defers to the SDK default chain
    pub region: Option<String>,

    /// Custom endpoint URL (LocalStack)
    pub endpoint: Option<String>,

    /// Secrets transferred at the same time (default: 1)
    pub concurrency: usize,

    /// Developer account user name, owned by the host
    pub username: Option<String>,

    /// Read-only mode, owned by the host
    pub readonly: bool,

    /// Team identifier, owned by the host
    pub team_id: Option<String>,

    /// Team name, owned by the host
    pub team_name: Option<String>,

    /// Path to an API key file, owned by the host
    pub api_key_path: Option<String>,

    /// Inline API key, owned by the host
    pub api_key: Option<Value>,

    /// Legacy git storage URL; ignored by this backend
    pub git_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path_prefix: String::new(),
            tags: TagSet::new(),
            region: None,
            endpoint: None,
            concurrency: 1,
            username: None,
            readonly: false,
            team_id: None,
            team_name: None,
            api_key_path: None,
            api_key: None,
            git_url: None,
        }
    }
}

/// Options bag as handed over by the host. `None` means "not given".
#[derive(Debug, Default, Deserialize)]
struct RawOptions {
    #[serde(alias = "path_prefix")]
    secrets_manager_path_prefix: Option<String>,
    #[serde(alias = "tags")]
    secrets_manager_tags: Option<TagSet>,
    #[serde(alias = "region")]
    secrets_manager_region: Option<String>,
    #[serde(alias = "endpoint")]
    secrets_manager_endpoint: Option<String>,
    #[serde(alias = "concurrency")]
    secrets_manager_concurrency: Option<usize>,
    username: Option<String>,
    readonly: Option<bool>,
    team_id: Option<String>,
    team_name: Option<String>,
    api_key_path: Option<String>,
    api_key: Option<Value>,
    git_url: Option<String>,
}

impl StorageConfig {
    /// Builds a configuration from the host's options bag and the process environment.
    ///
    /// Explicit options win over environment variables, which win over defaults.
    /// Unknown keys are ignored so hosts can pass their whole option set.
    ///
    /// # Errors
    ///
    /// Returns [`SecretMatchError::Configuration`] if a value has the wrong type
    /// or an environment variable cannot be parsed.
    pub fn from_options(options: &Map<String, Value>) -> Result<Self> {
        Self::from_options_with_env(options, |name| std::env::var(name).ok())
    }

    /// Like [`from_options`](Self::from_options) with an explicit environment lookup.
    pub fn from_options_with_env(
        options: &Map<String, Value>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let raw: RawOptions = serde_json::from_value(Value::Object(strip_nulls(options)))
            .map_err(|e| SecretMatchError::Configuration(format!("invalid option: {e}")))?;

        let env_value = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let tags = match raw.secrets_manager_tags {
            Some(tags) => tags,
            None => env_value(ENV_TAGS)
                .map(|v| parse_tags(&v))
                .transpose()?
                .unwrap_or_default(),
        };

        let concurrency = match raw.secrets_manager_concurrency {
            Some(n) => n,
            None => env_value(ENV_CONCURRENCY)
                .map(|v| {
                    v.trim().parse::<usize>().map_err(|_| {
                        SecretMatchError::Configuration(format!(
                            "{ENV_CONCURRENCY} must be a positive integer, got {v:?}"
                        ))
                    })
                })
                .transpose()?
                .unwrap_or(1),
        };

        Ok(Self {
            path_prefix: raw
                .secrets_manager_path_prefix
                .or_else(|| env_value(ENV_PATH_PREFIX))
                .unwrap_or_default(),
            tags,
            region: raw
                .secrets_manager_region
                .or_else(|| env_value(ENV_REGION))
                .or_else(|| env_value(ENV_AWS_REGION)),
            endpoint: raw
                .secrets_manager_endpoint
                .or_else(|| env_value(ENV_ENDPOINT)),
            concurrency: concurrency.max(1),
            username: raw.username,
            readonly: raw.readonly.unwrap_or(false),
            team_id: raw.team_id.filter(|t| !t.is_empty()),
            team_name: raw.team_name,
            api_key_path: raw.api_key_path,
            api_key: raw.api_key,
            git_url: raw.git_url,
        })
    }

    /// Sets the secret name prefix.
    ///
    /// All secrets are stored as `{prefix}/{path in working tree}`.
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    /// Adds a tag applied to newly created secrets.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Sets the AWS region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets a custom endpoint URL (for LocalStack testing).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets how many secrets are transferred at the same time.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Enables or disables read-only mode.
    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Sets the team identifier.
    pub fn with_team_id(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }
}

fn strip_nulls(options: &Map<String, Value>) -> Map<String, Value> {
    options
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Parses tags from a JSON object or `key=value` pairs separated by commas.
///
/// ```
/// use secretmatch::config::parse_tags;
///
/// let tags = parse_tags("Team=mobile, Env=prod").unwrap();
/// assert_eq!(tags["Team"], "mobile");
///
/// let tags = parse_tags(r#"{"Team": "mobile"}"#).unwrap();
/// assert_eq!(tags["Team"], "mobile");
/// ```
pub fn parse_tags(input: &str) -> Result<TagSet> {
    let input = input.trim();
    if input.starts_with('{') {
        return serde_json::from_str(input)
            .map_err(|e| SecretMatchError::Configuration(format!("{ENV_TAGS}: {e}")));
    }

    input
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                SecretMatchError::Configuration(format!(
                    "{ENV_TAGS}: expected key=value, got {pair:?}"
                ))
            })?;
            Ok((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn bag(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_builder() {
        let config = StorageConfig::default()
            .with_path_prefix("ios")
            .with_region("us-west-2")
            .with_tag("Team", "mobile")
            .with_concurrency(0);

        assert_eq!(config.path_prefix, "ios");
        assert_eq!(config.region.as_deref(), Some("us-west-2"));
        assert_eq!(config.tags["Team"], "mobile");
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.path_prefix, "");
        assert!(config.tags.is_empty());
        assert!(!config.readonly);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_from_options() {
        let options = bag(json!({
            "secrets_manager_path_prefix": "ios/match",
            "secrets_manager_tags": {"Team": "mobile"},
            "secrets_manager_region": "eu-central-1",
            "readonly": true,
            "team_id": "AB12CD34EF",
            "type": "development",
            "platform": "ios",
            "app_identifier": ["com.example.app"],
            "git_url": null
        }));

        let config = StorageConfig::from_options_with_env(&options, env(&[])).unwrap();
        assert_eq!(config.path_prefix, "ios/match");
        assert_eq!(config.tags["Team"], "mobile");
        assert_eq!(config.region.as_deref(), Some("eu-central-1"));
        assert!(config.readonly);
        assert_eq!(config.team_id.as_deref(), Some("AB12CD34EF"));
        assert_eq!(config.git_url, None);
    }

    #[test]
    fn test_environment_fills_missing_options() {
        let vars = env(&[
            (ENV_PATH_PREFIX, "from-env"),
            (ENV_TAGS, "Team=mobile,Env=ci"),
            (ENV_AWS_REGION, "ap-south-1"),
            (ENV_CONCURRENCY, "8"),
        ]);

        let config = StorageConfig::from_options_with_env(&Map::new(), vars).unwrap();
        assert_eq!(config.path_prefix, "from-env");
        assert_eq!(config.tags.len(), 2);
        assert_eq!(config.region.as_deref(), Some("ap-south-1"));
        assert_eq!(config.concurrency, 8);
    }

    #[test]
    fn test_explicit_options_beat_environment() {
        let vars = env(&[
            (ENV_PATH_PREFIX, "from-env"),
            (ENV_REGION, "us-east-2"),
            (ENV_AWS_REGION, "ap-south-1"),
        ]);
        let options = bag(json!({ "secrets_manager_path_prefix": "explicit" }));

        let config = StorageConfig::from_options_with_env(&options, vars).unwrap();
        assert_eq!(config.path_prefix, "explicit");
        assert_eq!(config.region.as_deref(), Some("us-east-2"));
    }

    #[test]
    fn test_invalid_option_type() {
        let options = bag(json!({ "secrets_manager_tags": "not-a-map" }));
        let result = StorageConfig::from_options_with_env(&options, env(&[]));
        assert!(matches!(result, Err(SecretMatchError::Configuration(_))));
    }

    #[test]
    fn test_invalid_concurrency_env() {
        let result = StorageConfig::from_options_with_env(&Map::new(), env(&[(ENV_CONCURRENCY, "many")]));
        assert!(result.unwrap_err().to_string().contains(ENV_CONCURRENCY));
    }

    #[test]
    fn test_parse_tags_rejects_missing_separator() {
        assert!(parse_tags("Team").is_err());
        assert!(parse_tags("").unwrap().is_empty());
    }
}
