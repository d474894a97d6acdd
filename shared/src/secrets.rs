//! AWS Secrets Manager integration.

use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::JiraConfig;
use crate::{Error, Result};

/// Cached secrets with lazy initialization.
static SECRETS_CACHE: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();

fn get_cache() -> &'static RwLock<HashMap<String, String>> {
    SECRETS_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Token secret stored as JSON.
#[derive(Debug, Deserialize)]
struct TokenSecret {
    token: String,
}

/// Get a secret value from Secrets Manager with caching.
pub async fn get_secret(client: &SecretsClient, secret_arn: &str) -> Result<String> {
    // Check cache first
    {
        let cache = get_cache().read().await;
        if let Some(value) = cache.get(secret_arn) {
            return Ok(value.clone());
        }
    }

    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get secret: {}", e)))?;

    let secret_string = response
        .secret_string()
        .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))?
        .to_string();

    {
        let mut cache = get_cache().write().await;
        cache.insert(secret_arn.to_string(), secret_string.clone());
    }

    Ok(secret_string)
}

/// Extract a token from a secret that is either `{"token": "..."}` or the raw token.
fn parse_token_secret(secret: &str) -> String {
    serde_json::from_str::<TokenSecret>(secret)
        .map(|parsed| parsed.token)
        .unwrap_or_else(|_| secret.trim().to_string())
}

/// Resolve the Jira bearer token, preferring an explicit value over Secrets Manager.
pub async fn resolve_jira_token(config: &JiraConfig) -> Result<String> {
    if let Some(token) = &config.token {
        return Ok(token.clone());
    }

    let secret_arn = config.token_secret_arn.as_deref().ok_or_else(|| {
        Error::Config("JIRA_TOKEN or JIRA_TOKEN_SECRET_ARN must be set".to_string())
    })?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let client = SecretsClient::new(&aws_config);
    let secret = get_secret(&client, secret_arn).await?;
    info!("Loaded Jira token from Secrets Manager");

    Ok(parse_token_secret(&secret))
}
