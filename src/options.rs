//! Option schema published to the host tool.
//!
//! Hosts merge these into their own option list so users can set the backend's
//! options from configuration files, command line flags or the environment.

use serde::Serialize;

/// Environment override for `secrets_manager_path_prefix`.
pub const ENV_PATH_PREFIX: &str = "MATCH_SECRETS_MANAGER_PATH_PREFIX";
/// Environment override for `secrets_manager_tags`.
pub const ENV_TAGS: &str = "MATCH_SECRETS_MANAGER_TAGS";
/// Environment override for `secrets_manager_region`.
pub const ENV_REGION: &str = "MATCH_SECRETS_MANAGER_REGION";
/// Environment override for `secrets_manager_endpoint`.
pub const ENV_ENDPOINT: &str = "MATCH_SECRETS_MANAGER_ENDPOINT";
/// Environment override for `secrets_manager_concurrency`.
pub const ENV_CONCURRENCY: &str = "MATCH_SECRETS_MANAGER_CONCURRENCY";
/// Ambient region used when no region option is set.
pub const ENV_AWS_REGION: &str = "AWS_REGION";

/// Value type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    /// Free-form string
    String,
    /// String to string mapping
    Hash,
    /// Positive integer
    Integer,
    /// true/false
    Boolean,
}

/// Description of one configurable option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionSpec {
    /// Key in the options bag
    pub key: &'static str,
    /// Environment variable that provides a value when the key is absent
    pub env_name: &'static str,
    /// Help text
    pub description: &'static str,
    /// Whether the option may be left unset
    pub optional: bool,
    /// Expected value type
    pub value_type: OptionType,
}

/// Options owned by the `secrets_manager` backend.
pub fn secrets_manager_options() -> Vec<OptionSpec> {
    vec![
        OptionSpec {
            key: "secrets_manager_path_prefix",
            env_name: ENV_PATH_PREFIX,
            description: "The prefix to be used for all Secrets Manager secrets. When empty, every secret in the account is downloaded",
            optional: true,
            value_type: OptionType::String,
        },
        OptionSpec {
            key: "secrets_manager_tags",
            env_name: ENV_TAGS,
            description: "Tags which are used when creating a new secret in Secrets Manager",
            optional: true,
            value_type: OptionType::Hash,
        },
        OptionSpec {
            key: "secrets_manager_region",
            env_name: ENV_REGION,
            description: "The AWS region of the Secrets Manager secrets",
            optional: true,
            value_type: OptionType::String,
        },
        OptionSpec {
            key: "secrets_manager_endpoint",
            env_name: ENV_ENDPOINT,
            description: "Custom Secrets Manager endpoint URL (e.g. LocalStack)",
            optional: true,
            value_type: OptionType::String,
        },
        OptionSpec {
            key: "secrets_manager_concurrency",
            env_name: ENV_CONCURRENCY,
            description: "How many secrets are transferred at the same time",
            optional: true,
            value_type: OptionType::Integer,
        },
    ]
}
