//! AWS Secrets Manager store implementation.

use crate::store::{SecretPage, SecretStore};
use crate::validation::validate_secret_name;
use crate::{Result, SecretMatchError, StorageConfig, TagSet};
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_secretsmanager::primitives::Blob;
use aws_sdk_secretsmanager::types::{Filter, FilterNameStringType, Tag};
use aws_sdk_secretsmanager::Client;
use tokio::sync::OnceCell;
use tracing::debug;

const BACKEND: &str = "awssecrets";

/// Service error codes that mean the caller's credentials are unusable.
const AUTH_ERROR_CODES: &[&str] = &[
    "ExpiredTokenException",
    "ExpiredToken",
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "InvalidClientTokenId",
];

/// AWS Secrets Manager store.
///
/// The SDK client is built on first use from the default credential chain,
/// the configured region and an optional custom endpoint (for LocalStack).
pub struct AwsSecretsStore {
    client: OnceCell<Client>,
    region: Option<String>,
    endpoint: Option<String>,
}

impl AwsSecretsStore {
    /// Creates a store from configuration. No network calls are made.
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            client: OnceCell::new(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        }
    }

    /// Creates a store around an existing SDK client.
    pub fn from_client(client: Client) -> Self {
        Self {
            client: OnceCell::new_with(Some(client)),
            region: None,
            endpoint: None,
        }
    }

    /// Region requests are sent to, when configured explicitly.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

                if let Some(ref region) = self.region {
                    config_loader = config_loader.region(aws_config::Region::new(region.clone()));
                }

                // Use custom endpoint if provided (for LocalStack testing)
                if let Some(ref endpoint) = self.endpoint {
                    debug!(endpoint = %endpoint, "using custom Secrets Manager endpoint");
                    config_loader = config_loader.endpoint_url(endpoint);
                }

                let config = config_loader.load().await;
                Client::new(&config)
            })
            .await
    }
}

fn to_aws_tags(tags: &TagSet) -> Vec<Tag> {
    tags.iter()
        .map(|(key, value)| Tag::builder().key(key).value(value).build())
        .collect()
}

/// Maps an SDK failure onto the crate error taxonomy.
fn classify<E>(operation: &str, key: &str, err: SdkError<E>) -> SecretMatchError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = match &err {
        SdkError::ServiceError(context) => context.err().code().map(str::to_string),
        _ => None,
    };
    let detail = DisplayErrorContext(&err).to_string();

    let inner = match code.as_deref() {
        Some("ResourceNotFoundException") => SecretMatchError::NotFound(key.to_string()),
        Some("ResourceExistsException") => SecretMatchError::AlreadyExists(key.to_string()),
        Some(code) if AUTH_ERROR_CODES.contains(&code) => SecretMatchError::authentication(detail),
        None if is_credentials_failure(&detail) => SecretMatchError::authentication(detail),
        _ => SecretMatchError::Other(anyhow::anyhow!("AWS error: {}", detail)),
    };

    SecretMatchError::store_op(BACKEND, operation, key, inner)
}

/// Credential provider failures surface before a request is sent, without a service error code.
fn is_credentials_failure(detail: &str) -> bool {
    let detail = detail.to_ascii_lowercase();
    detail.contains("credentials") || detail.contains("no credential")
}

#[async_trait]
impl SecretStore for AwsSecretsStore {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn list_secrets(&self, prefix_filter: &str, cursor: Option<&str>) -> Result<SecretPage> {
        let mut request = self.client().await.list_secrets();

        if !prefix_filter.is_empty() {
            request = request.filters(
                Filter::builder()
                    .key(FilterNameStringType::Name)
                    .values(prefix_filter)
                    .build(),
            );
        }

        if let Some(token) = cursor {
            request = request.next_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify("list_secrets", prefix_filter, e))?;

        let keys = response
            .secret_list()
            .iter()
            .filter_map(|secret| secret.name().map(str::to_string))
            .collect();

        Ok(SecretPage {
            keys,
            next_cursor: response.next_token().map(str::to_string),
        })
    }

    async fn get_secret_value(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client()
            .await
            .get_secret_value()
            .secret_id(key)
            .send()
            .await
            .map_err(|e| classify("get_secret_value", key, e))?;

        if let Some(binary) = response.secret_binary() {
            return Ok(binary.as_ref().to_vec());
        }

        response
            .secret_string()
            .map(|s| s.as_bytes().to_vec())
            .ok_or_else(|| {
                SecretMatchError::store_op(
                    BACKEND,
                    "get_secret_value",
                    key,
                    SecretMatchError::Other(anyhow::anyhow!("secret has no value")),
                )
            })
    }

    async fn secret_exists(&self, key: &str) -> Result<bool> {
        match self
            .client()
            .await
            .describe_secret()
            .secret_id(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = classify("describe_secret", key, e);
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn create_secret(&self, key: &str, payload: &[u8], tags: &TagSet) -> Result<()> {
        validate_secret_name(key)?;

        let mut request = self
            .client()
            .await
            .create_secret()
            .name(key)
            .secret_binary(Blob::new(payload));

        if !tags.is_empty() {
            request = request.set_tags(Some(to_aws_tags(tags)));
        }

        request
            .send()
            .await
            .map_err(|e| classify("create_secret", key, e))?;

        Ok(())
    }

    async fn put_secret_value(&self, key: &str, payload: &[u8]) -> Result<()> {
        self.client()
            .await
            .put_secret_value()
            .secret_id(key)
            .secret_binary(Blob::new(payload))
            .send()
            .await
            .map_err(|e| classify("put_secret_value", key, e))?;

        Ok(())
    }

    async fn tag_resource(&self, key: &str, tags: &TagSet) -> Result<()> {
        self.client()
            .await
            .tag_resource()
            .secret_id(key)
            .set_tags(Some(to_aws_tags(tags)))
            .send()
            .await
            .map_err(|e| classify("tag_resource", key, e))?;

        Ok(())
    }

    async fn delete_secret(&self, key: &str, recovery_window_days: i64) -> Result<()> {
        self.client()
            .await
            .delete_secret()
            .secret_id(key)
            .recovery_window_in_days(recovery_window_days)
            .send()
            .await
            .map_err(|e| classify("delete_secret", key, e))?;

        Ok(())
    }
}
