//! Data source type definitions
//!
//! This module defines:
//! - Data source types (implementing the DataSourceType trait)
//! - Schema lookup by DSL type name

pub mod blueprint_definition;

use carina_core::provider::DataSourceType;
use carina_core::schema::ResourceSchema;

// =============================================================================
// Data Source Type Definitions
// =============================================================================

macro_rules! define_data_source_type {
    ($name:ident, $type_name:expr, $schema:path) => {
        pub struct $name;
        impl DataSourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $schema()
            }
        }
    };
}

define_data_source_type!(
    BlueprintDefinitionType,
    blueprint_definition::DATA_SOURCE_TYPE,
    blueprint_definition::blueprint_definition_schema
);

/// Returns all data source types supported by this provider
pub fn data_source_types() -> Vec<Box<dyn DataSourceType>> {
    vec![Box::new(BlueprintDefinitionType)]
}

/// Returns all data source schemas
pub fn schemas() -> Vec<ResourceSchema> {
    data_source_types().iter().map(|t| t.schema()).collect()
}

/// Get a data source schema by DSL type name
pub fn get_schema(data_source_type: &str) -> Option<ResourceSchema> {
    data_source_types()
        .into_iter()
        .find(|t| t.name() == data_source_type)
        .map(|t| t.schema())
}
