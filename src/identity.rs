//! Team identity resolution.
//!
//! Secrets are partitioned by developer team. Looking a team up in the
//! developer portal is the host's job; this module only defines the seam and
//! the rules for when a team id is required.

use crate::{Result, SecretMatchError, StorageConfig};
use async_trait::async_trait;
use serde_json::Value;

/// What the host needs to identify the team.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamLookup {
    /// Developer account user name
    pub username: Option<String>,
    /// Configured team identifier
    pub team_id: Option<String>,
    /// Configured team name
    pub team_name: Option<String>,
    /// Path to an API key file
    pub api_key_path: Option<String>,
    /// Inline API key
    pub api_key: Option<Value>,
}

impl From<&StorageConfig> for TeamLookup {
    fn from(config: &StorageConfig) -> Self {
        Self {
            username: config.username.clone(),
            team_id: config.team_id.clone(),
            team_name: config.team_name.clone(),
            api_key_path: config.api_key_path.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

/// Resolves the team a read-write session works for.
#[async_trait]
pub trait TeamIdResolver: Send + Sync {
    /// Returns the confirmed team id.
    ///
    /// # Errors
    ///
    /// Any error is fatal for the session; it is not retried.
    async fn resolve_team_id(&self, lookup: &TeamLookup) -> Result<String>;
}

/// Trusts the configured team id without contacting the developer portal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredTeamId;

#[async_trait]
impl TeamIdResolver for ConfiguredTeamId {
    async fn resolve_team_id(&self, lookup: &TeamLookup) -> Result<String> {
        lookup
            .team_id
            .clone()
            .ok_or_else(|| SecretMatchError::Configuration("team_id is not set".to_string()))
    }
}

/// Determines the team id in use.
///
/// In read-only mode the configured team id is returned as is and may be
/// absent. In read-write mode a team id is mandatory and is confirmed through
/// `resolver`.
///
/// # Errors
///
/// Returns [`SecretMatchError::Configuration`] in read-write mode when no
/// team id is configured.
pub async fn current_team_id(
    config: &StorageConfig,
    resolver: &dyn TeamIdResolver,
) -> Result<Option<String>> {
    if config.readonly {
        return Ok(config.team_id.clone());
    }

    if config.team_id.as_deref().map_or(true, str::is_empty) {
        return Err(SecretMatchError::Configuration(
            "The `team_id` option is required. The portal team id cannot be determined \
             automatically through the App Store Connect API (yet)"
                .to_string(),
        ));
    }

    let lookup = TeamLookup::from(config);
    resolver.resolve_team_id(&lookup).await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PortalLookup;

    #[async_trait]
    impl TeamIdResolver for PortalLookup {
        async fn resolve_team_id(&self, lookup: &TeamLookup) -> Result<String> {
            Ok(format!("portal-{}", lookup.team_id.as_deref().unwrap_or("?")))
        }
    }

    #[tokio::test]
    async fn test_readonly_without_team() {
        let config = StorageConfig::default().with_readonly(true);
        assert_eq!(current_team_id(&config, &PortalLookup).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_readonly_skips_resolver() {
        let config = StorageConfig::default()
            .with_readonly(true)
            .with_team_id("AB12CD34EF");
        assert_eq!(
            current_team_id(&config, &PortalLookup).await.unwrap().as_deref(),
            Some("AB12CD34EF")
        );
    }

    #[tokio::test]
    async fn test_readwrite_requires_team() {
        let config = StorageConfig::default();
        let err = current_team_id(&config, &ConfiguredTeamId).await.unwrap_err();
        assert!(matches!(err, SecretMatchError::Configuration(_)));
        assert!(err.to_string().contains("team_id"));
    }

    #[tokio::test]
    async fn test_readwrite_uses_resolver() {
        let config = StorageConfig::default().with_team_id("AB12CD34EF");
        assert_eq!(
            current_team_id(&config, &PortalLookup).await.unwrap().as_deref(),
            Some("portal-AB12CD34EF")
        );
        assert_eq!(
            current_team_id(&config, &ConfiguredTeamId).await.unwrap().as_deref(),
            Some("AB12CD34EF")
        );
    }
}
