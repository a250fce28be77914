//! Azure Blueprints client
//!
//! `BlueprintsClient` is the seam the data source reads through. The
//! `ArmBlueprintsClient` implementation talks to the ARM REST API with a
//! pre-acquired bearer token.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::config::AzurermConfig;

/// ARM API version of the Microsoft.Blueprint provider
pub const API_VERSION: &str = "2018-11-01-preview";

/// Management boundary a blueprint definition lives under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlueprintScope {
    Subscription,
    ManagementGroup,
}

impl BlueprintScope {
    pub const ALL: [BlueprintScope; 2] = [
        BlueprintScope::Subscription,
        BlueprintScope::ManagementGroup,
    ];

    /// Name used in configuration (e.g., "managementGroup")
    pub fn as_str(&self) -> &'static str {
        match self {
            BlueprintScope::Subscription => "subscription",
            BlueprintScope::ManagementGroup => "managementGroup",
        }
    }

    /// All configuration names, in declaration order
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }
}

impl fmt::Display for BlueprintScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlueprintScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid scope '{}', expected one of: {}",
                    s,
                    Self::names().join(", ")
                )
            })
    }
}

/// Blueprint definition as returned by ARM
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DefinitionRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub properties: DefinitionProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionProperties {
    pub description: Option<String>,
    pub display_name: Option<String>,
    pub target_scope: Option<String>,
    /// Published version names
    #[serde(default, deserialize_with = "deserialize_versions")]
    pub versions: Option<Vec<String>>,
    #[serde(default)]
    pub status: DefinitionStatus,
}

/// Timestamps maintained by the service; may be absent or null
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionStatus {
    #[serde(default)]
    pub time_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Versions arrive either as a list of names or as an object keyed by name.
fn deserialize_versions<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let versions = match raw {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Array(items)) => Some(
            items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => Ok(s),
                    other => Err(serde::de::Error::custom(format!(
                        "expected version name, got {}",
                        other
                    ))),
                })
                .collect::<Result<Vec<_>, D::Error>>()?,
        ),
        Some(serde_json::Value::Object(map)) => {
            let mut names: Vec<String> = map.keys().cloned().collect();
            names.sort();
            Some(names)
        }
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected list or object of versions, got {}",
                other
            )));
        }
    };
    Ok(versions)
}

/// Errors raised by the blueprints client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{resource} was not found")]
    NotFound { resource: String },

    #[error("Request to {url} failed with status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Client configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// True when the service reported that the resource does not exist (HTTP 404)
    pub fn is_not_found(&self) -> bool {
        match self {
            ClientError::NotFound { .. } => true,
            ClientError::Status { status, .. } => *status == StatusCode::NOT_FOUND.as_u16(),
            _ => false,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Remote capability used by the blueprint definition data source
///
/// Implementations must be safe to share between concurrent reads.
#[async_trait]
pub trait BlueprintsClient: Send + Sync {
    /// Get a blueprint definition by scope and name
    async fn get(&self, scope: BlueprintScope, name: &str) -> ClientResult<DefinitionRecord>;
}

/// `BlueprintsClient` backed by the ARM REST API
pub struct ArmBlueprintsClient {
    http: reqwest::Client,
    endpoint: Url,
    subscription_id: String,
    management_group_id: Option<String>,
    access_token: Option<String>,
}

impl ArmBlueprintsClient {
    pub fn new(config: &AzurermConfig) -> ClientResult<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            ClientError::Configuration(format!("Invalid endpoint '{}': {}", config.endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(ClientError::Configuration(format!(
                "Invalid endpoint '{}': not a base URL",
                config.endpoint
            )));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("carina-provider-azurerm/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            subscription_id: config.subscription_id.clone(),
            management_group_id: config.management_group_id.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// Path segments of the ARM scope a lookup runs under
    pub fn resource_scope(&self, scope: BlueprintScope) -> ClientResult<Vec<String>> {
        match scope {
            BlueprintScope::Subscription => {
                Ok(vec!["subscriptions".into(), self.subscription_id.clone()])
            }
            BlueprintScope::ManagementGroup => {
                let group = self.management_group_id.as_ref().ok_or_else(|| {
                    ClientError::Configuration(
                        "management_group_id is required for managementGroup scoped lookups"
                            .to_string(),
                    )
                })?;
                Ok(vec![
                    "providers".into(),
                    "Microsoft.Management".into(),
                    "managementGroups".into(),
                    group.clone(),
                ])
            }
        }
    }

    /// URL of a blueprint definition
    pub fn definition_url(&self, scope: BlueprintScope, name: &str) -> ClientResult<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ClientError::Configuration(format!("Invalid endpoint '{}'", self.endpoint))
            })?;
            segments.pop_if_empty();
            segments.extend(self.resource_scope(scope)?);
            segments.extend(["providers", "Microsoft.Blueprint", "blueprints", name]);
        }
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }
}

#[async_trait]
impl BlueprintsClient for ArmBlueprintsClient {
    async fn get(&self, scope: BlueprintScope, name: &str) -> ClientResult<DefinitionRecord> {
        let url = self.definition_url(scope, name)?;

        let mut request = self.http.get(url.clone());
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                resource: format!("Blueprint definition '{}' ({})", name, scope),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
