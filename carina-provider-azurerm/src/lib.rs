//! Carina AzureRM Provider
//!
//! Azure Resource Manager data sources.
//!
//! ## Module Structure
//!
//! - `clients` - ARM API clients (the seam data sources read through)
//! - `config` - Provider configuration from the environment or a provider block
//! - `data_sources` - Data source schemas and read logic
//! - `provider` - AzurermProvider implementation

pub mod clients;
pub mod config;
pub mod data_sources;
pub mod provider;

// Re-export main types
pub use config::AzurermConfig;
pub use provider::AzurermProvider;

use carina_core::provider::{BoxFuture, DataSourceType, Provider, ProviderResult};
use carina_core::resource::{Resource, State};

use data_sources::data_source_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for AzurermProvider {
    fn name(&self) -> &'static str {
        "azurerm"
    }

    fn data_source_types(&self) -> Vec<Box<dyn DataSourceType>> {
        data_source_types()
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.read_resource(&resource).await })
    }
}
