//! Clients for the Azure Resource Manager APIs used by the data sources

pub mod blueprints;

pub use blueprints::{
    ArmBlueprintsClient, BlueprintScope, BlueprintsClient, ClientError, ClientResult,
    DefinitionRecord,
};
