//! Provider configuration
//!
//! Settings come either from the process environment (`ARM_*` variables)
//! or from a provider block's attribute map.

use std::collections::HashMap;

use carina_core::resource::Value;
use carina_core::timeouts::{Timeouts, parse_duration};
use thiserror::Error;

/// Azure Resource Manager endpoint of the public cloud
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

pub const ENV_SUBSCRIPTION_ID: &str = "ARM_SUBSCRIPTION_ID";
pub const ENV_MANAGEMENT_GROUP_ID: &str = "ARM_MANAGEMENT_GROUP_ID";
pub const ENV_ENDPOINT: &str = "ARM_ENDPOINT";
pub const ENV_ACCESS_TOKEN: &str = "ARM_ACCESS_TOKEN";
pub const ENV_READ_TIMEOUT: &str = "ARM_READ_TIMEOUT";

/// Errors raised while building the provider configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting '{0}'")]
    Missing(String),

    #[error("Setting '{key}' must be a string")]
    NotAString { key: String },

    #[error("Invalid read timeout '{value}': {message}")]
    InvalidTimeout { value: String, message: String },
}

/// Configuration of the AzureRM provider
#[derive(Clone)]
pub struct AzurermConfig {
    pub subscription_id: String,
    /// Management group used for `managementGroup` scoped lookups
    pub management_group_id: Option<String>,
    pub endpoint: String,
    /// Pre-acquired bearer token; token acquisition happens outside the provider
    pub access_token: Option<String>,
    pub timeouts: Timeouts,
}

impl std::fmt::Debug for AzurermConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzurermConfig")
            .field("subscription_id", &self.subscription_id)
            .field("management_group_id", &self.management_group_id)
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl AzurermConfig {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            management_group_id: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_management_group(mut self, id: impl Into<String>) -> Self {
        self.management_group_id = Some(id.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Build from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup using the `ARM_*` variable names
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let subscription_id = get(ENV_SUBSCRIPTION_ID)
            .ok_or_else(|| ConfigError::Missing(ENV_SUBSCRIPTION_ID.into()))?;

        let mut config = Self::new(subscription_id);
        config.management_group_id = get(ENV_MANAGEMENT_GROUP_ID);
        config.access_token = get(ENV_ACCESS_TOKEN);
        if let Some(endpoint) = get(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(timeout) = get(ENV_READ_TIMEOUT) {
            config.timeouts = read_timeouts(&timeout)?;
        }
        Ok(config)
    }

    /// Build from a provider block
    ///
    /// Recognized keys: `subscription_id` (required), `management_group_id`,
    /// `endpoint`, `access_token`, `read_timeout`.
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Self, ConfigError> {
        let subscription_id = get_string(attributes, "subscription_id")?
            .ok_or_else(|| ConfigError::Missing("subscription_id".into()))?;

        let mut config = Self::new(subscription_id);
        config.management_group_id = get_string(attributes, "management_group_id")?;
        config.access_token = get_string(attributes, "access_token")?;
        if let Some(endpoint) = get_string(attributes, "endpoint")? {
            config.endpoint = endpoint;
        }
        if let Some(timeout) = get_string(attributes, "read_timeout")? {
            config.timeouts = read_timeouts(&timeout)?;
        }
        Ok(config)
    }
}

fn get_string(
    attributes: &HashMap<String, Value>,
    key: &str,
) -> Result<Option<String>, ConfigError> {
    match attributes.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigError::NotAString { key: key.into() }),
    }
}

fn read_timeouts(value: &str) -> Result<Timeouts, ConfigError> {
    let read = parse_duration(value).map_err(|message| ConfigError::InvalidTimeout {
        value: value.to_string(),
        message,
    })?;
    Ok(Timeouts::default().with_read(read))
}
