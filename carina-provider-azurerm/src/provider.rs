//! AzureRM Provider implementation
//!
//! This module contains the provider that reads data sources through the
//! Azure Resource Manager clients.

use std::sync::Arc;

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, State};
use log::debug;

use crate::clients::{ArmBlueprintsClient, BlueprintsClient};
use crate::config::AzurermConfig;
use crate::data_sources::blueprint_definition::{
    self, BlueprintDefinitionError, LookupRequest, read_blueprint_definition,
};

/// AzureRM Provider
pub struct AzurermProvider {
    config: AzurermConfig,
    blueprints: Arc<dyn BlueprintsClient>,
}

impl AzurermProvider {
    /// Create a provider talking to ARM with the given configuration
    pub fn new(config: AzurermConfig) -> ProviderResult<Self> {
        let blueprints = ArmBlueprintsClient::new(&config).map_err(|e| {
            ProviderError::new(format!("Failed to create blueprints client: {}", e)).with_cause(e)
        })?;
        Ok(Self::with_clients(config, Arc::new(blueprints)))
    }

    /// Create a provider configured from `ARM_*` environment variables
    pub fn from_env() -> ProviderResult<Self> {
        let config = AzurermConfig::from_env().map_err(|e| {
            ProviderError::new(format!("Invalid provider configuration: {}", e)).with_cause(e)
        })?;
        Self::new(config)
    }

    /// Create a provider with explicit clients
    pub fn with_clients(config: AzurermConfig, blueprints: Arc<dyn BlueprintsClient>) -> Self {
        Self { config, blueprints }
    }

    pub fn config(&self) -> &AzurermConfig {
        &self.config
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Read a data source using its configuration
    pub async fn read_resource(&self, resource: &Resource) -> ProviderResult<State> {
        if !resource.is_data_source() {
            return Err(ProviderError::new(format!(
                "{} is not a data source; azurerm only supports reads",
                resource.id.resource_type
            ))
            .for_resource(resource.id.clone()));
        }

        match resource.id.resource_type.as_str() {
            blueprint_definition::DATA_SOURCE_TYPE => {
                self.read_blueprint_definition(resource).await
            }
            other => Err(
                ProviderError::new(format!("Unknown data source type: {}", other))
                    .for_resource(resource.id.clone()),
            ),
        }
    }

    /// Read a blueprint_definition data source
    async fn read_blueprint_definition(&self, resource: &Resource) -> ProviderResult<State> {
        let to_provider_error = |e: BlueprintDefinitionError| {
            ProviderError::new(e.to_string())
                .for_resource(resource.id.clone())
                .with_cause(e)
        };

        let request =
            LookupRequest::from_attributes(&resource.attributes).map_err(to_provider_error)?;
        let timeouts = request.timeouts(&self.config.timeouts);
        let definition = read_blueprint_definition(self.blueprints.as_ref(), &request, &timeouts)
            .await
            .map_err(to_provider_error)?;

        debug!("Read {} as {}", resource.id, definition.id);
        Ok(definition.into_state(resource.id.clone(), &request))
    }
}
