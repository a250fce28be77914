//! blueprint_definition data source
//!
//! Looks up an Azure Blueprint definition by name under a subscription or
//! management group and exposes its metadata as computed attributes.

use std::collections::HashMap;
use std::time::Duration;

use carina_core::resource::{ResourceId, State, Value};
use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, TypeError, types};
use carina_core::timeouts::{Timeouts, parse_duration, with_read_timeout};
use chrono::SecondsFormat;
use log::{debug, warn};
use thiserror::Error;

use crate::clients::{BlueprintScope, BlueprintsClient, ClientError, DefinitionRecord};

pub const DATA_SOURCE_TYPE: &str = "blueprint_definition";

/// Returns the schema for blueprint_definition
pub fn blueprint_definition_schema() -> ResourceSchema {
    ResourceSchema::new(format!("azurerm.{}", DATA_SOURCE_TYPE))
        .with_description("Use this data source to access information about an existing Azure Blueprint Definition.")
        .attribute(
            AttributeSchema::new("name", types::non_empty_string())
                .required()
                .with_description("The name of the Blueprint Definition."),
        )
        .attribute(
            AttributeSchema::new("scope", types::string_in(&BlueprintScope::names()))
                .required()
                .with_description("The scope at which the Blueprint Definition is stored: `subscription` or `managementGroup`."),
        )
        .attribute(
            AttributeSchema::new("read_timeout", types::duration())
                .with_description("Deadline for this lookup (e.g. `30s`, `2m`). Defaults to the provider's read timeout."),
        )
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .computed()
                .with_description("The description of the Blueprint Definition."),
        )
        .attribute(
            AttributeSchema::new("display_name", AttributeType::String)
                .computed()
                .with_description("The display name of the Blueprint Definition."),
        )
        .attribute(
            AttributeSchema::new("last_modified", AttributeType::String)
                .computed()
                .with_description("The timestamp of when this last modification was saved to the Blueprint Definition."),
        )
        .attribute(
            AttributeSchema::new("target_scope", AttributeType::String)
                .computed()
                .with_description("The target scope of the Blueprint Definition. Currently never populated."),
        )
        .attribute(
            AttributeSchema::new("time_created", AttributeType::String)
                .computed()
                .with_description("The timestamp of when this Blueprint Definition was created."),
        )
        .attribute(
            AttributeSchema::new("type", AttributeType::String)
                .computed()
                .with_description("The type of the Blueprint Definition."),
        )
        .attribute(
            AttributeSchema::new("versions", types::string_list())
                .computed()
                .with_description("A list of versions published for this Blueprint Definition."),
        )
}

/// Errors of a blueprint definition lookup
#[derive(Debug, Error)]
pub enum BlueprintDefinitionError {
    /// An input could not be read out of the attribute map
    #[error("Attribute '{attribute}' {message}")]
    Extraction { attribute: String, message: String },

    /// Inputs were read but break the schema
    #[error("Invalid Blueprint Definition lookup: {}", join_errors(.0))]
    Validation(Vec<TypeError>),

    #[error("Blueprint Definition {name:?} not found in Scope (\"{scope}\")")]
    NotFound {
        name: String,
        scope: BlueprintScope,
        #[source]
        source: ClientError,
    },

    #[error("Read failed for Blueprint Definition ({name:?}) in Scope (\"{scope}\"): {source}")]
    ReadFailed {
        name: String,
        scope: BlueprintScope,
        #[source]
        source: ClientError,
    },

    #[error("Failed to retrieve ID for Blueprint {name:?}")]
    MissingIdentifier { name: String },

    #[error("Timed out after {timeout:?} reading Blueprint Definition {name:?} in Scope (\"{scope}\")")]
    TimedOut {
        name: String,
        scope: BlueprintScope,
        timeout: Duration,
    },
}

fn join_errors(errors: &[TypeError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validated inputs of a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    name: String,
    scope: BlueprintScope,
    read_timeout: Option<Duration>,
}

impl LookupRequest {
    pub fn new(
        name: impl Into<String>,
        scope: BlueprintScope,
    ) -> Result<Self, BlueprintDefinitionError> {
        let name = name.into();
        types::non_empty_string()
            .validate(&Value::String(name.clone()))
            .map_err(|e| BlueprintDefinitionError::Validation(vec![e.for_attribute("name")]))?;
        Ok(Self {
            name,
            scope,
            read_timeout: None,
        })
    }

    /// Override the provider's read deadline for this lookup
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = Some(read_timeout);
        self
    }

    /// Read and validate the inputs out of a caller-supplied attribute map
    ///
    /// Missing or non-string inputs are extraction errors; values that are
    /// present but break the schema are validation errors.
    pub fn from_attributes(
        attributes: &HashMap<String, Value>,
    ) -> Result<Self, BlueprintDefinitionError> {
        let name = extract_string(attributes, "name")?;
        let scope = extract_string(attributes, "scope")?;
        let read_timeout = match attributes.get("read_timeout") {
            Some(_) => Some(extract_string(attributes, "read_timeout")?),
            None => None,
        };

        blueprint_definition_schema()
            .validate(attributes)
            .map_err(BlueprintDefinitionError::Validation)?;

        let scope = scope.parse::<BlueprintScope>().map_err(|message| {
            BlueprintDefinitionError::Validation(vec![TypeError::ValidationFailed { message }])
        })?;
        let read_timeout = read_timeout
            .map(parse_duration)
            .transpose()
            .map_err(|message| {
                BlueprintDefinitionError::Validation(vec![
                    TypeError::ValidationFailed { message }.for_attribute("read_timeout"),
                ])
            })?;
        Ok(Self {
            name: name.to_string(),
            scope,
            read_timeout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> BlueprintScope {
        self.scope
    }

    /// Deadlines for this lookup, falling back to `defaults`
    pub fn timeouts(&self, defaults: &Timeouts) -> Timeouts {
        match self.read_timeout {
            Some(read) => defaults.with_read(read),
            None => *defaults,
        }
    }
}

fn extract_string<'a>(
    attributes: &'a HashMap<String, Value>,
    key: &str,
) -> Result<&'a str, BlueprintDefinitionError> {
    let value = attributes
        .get(key)
        .ok_or_else(|| BlueprintDefinitionError::Extraction {
            attribute: key.to_string(),
            message: "is required".to_string(),
        })?;
    value
        .as_str()
        .ok_or_else(|| BlueprintDefinitionError::Extraction {
            attribute: key.to_string(),
            message: "must be a string".to_string(),
        })
}

/// Result of a successful lookup
///
/// Absent optional fields stay empty; the id is always non-empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlueprintDefinition {
    pub id: String,
    pub description: String,
    pub display_name: String,
    pub last_modified: String,
    pub target_scope: String,
    pub time_created: String,
    pub resource_type: String,
    pub versions: Vec<String>,
}

impl BlueprintDefinition {
    /// Computed attributes keyed by schema name
    pub fn attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();
        attributes.insert("description".to_string(), Value::from(self.description.as_str()));
        attributes.insert("display_name".to_string(), Value::from(self.display_name.as_str()));
        attributes.insert("last_modified".to_string(), Value::from(self.last_modified.as_str()));
        attributes.insert("target_scope".to_string(), Value::from(self.target_scope.as_str()));
        attributes.insert("time_created".to_string(), Value::from(self.time_created.as_str()));
        attributes.insert("type".to_string(), Value::from(self.resource_type.as_str()));
        attributes.insert("versions".to_string(), Value::string_list(self.versions.iter().cloned()));
        attributes
    }

    /// Convert into the State reported for `id`, echoing the lookup inputs
    pub fn into_state(self, id: ResourceId, request: &LookupRequest) -> State {
        let mut attributes = self.attributes();
        attributes.insert("name".to_string(), Value::from(request.name()));
        attributes.insert("scope".to_string(), Value::from(request.scope().as_str()));
        if let Some(read_timeout) = &request.read_timeout {
            attributes.insert(
                "read_timeout".to_string(),
                Value::from(format!("{}s", read_timeout.as_secs())),
            );
        }
        State::existing(id, attributes).with_identifier(self.id)
    }
}

/// Look up a blueprint definition
///
/// Issues exactly one `get` on `client`, bounded by the read deadline.
/// Nothing is retried.
pub async fn read_blueprint_definition(
    client: &dyn BlueprintsClient,
    request: &LookupRequest,
    timeouts: &Timeouts,
) -> Result<BlueprintDefinition, BlueprintDefinitionError> {
    let name = request.name();
    let scope = request.scope();
    debug!("Reading Blueprint Definition {:?} in scope {}", name, scope);

    let response = with_read_timeout(timeouts, client.get(scope, name))
        .await
        .map_err(|_| BlueprintDefinitionError::TimedOut {
            name: name.to_string(),
            scope,
            timeout: timeouts.read,
        })?;

    let record = response.map_err(|source| {
        if source.is_not_found() {
            BlueprintDefinitionError::NotFound {
                name: name.to_string(),
                scope,
                source,
            }
        } else {
            BlueprintDefinitionError::ReadFailed {
                name: name.to_string(),
                scope,
                source,
            }
        }
    })?;

    project(name, record)
}

/// Map a record onto the computed attributes
fn project(
    name: &str,
    record: DefinitionRecord,
) -> Result<BlueprintDefinition, BlueprintDefinitionError> {
    let id = match record.id {
        Some(id) if !id.is_empty() => id,
        _ => {
            warn!("Blueprint Definition {:?} was returned without an ID", name);
            return Err(BlueprintDefinitionError::MissingIdentifier {
                name: name.to_string(),
            });
        }
    };

    let properties = record.properties;
    let mut definition = BlueprintDefinition {
        id,
        last_modified: properties
            .status
            .last_modified
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        time_created: properties
            .status
            .time_created
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ..Default::default()
    };

    if let Some(description) = properties.description {
        definition.description = description;
    }
    if let Some(display_name) = properties.display_name {
        definition.display_name = display_name;
    }
    if let Some(resource_type) = record.resource_type {
        definition.resource_type = resource_type;
    }
    if let Some(versions) = properties.versions {
        definition.versions = versions;
    }
    // TODO: project properties.target_scope into target_scope once the
    // upstream provider confirms that mapping; it is left empty until then.

    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientResult;
    use crate::clients::blueprints::{DefinitionProperties, DefinitionStatus};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum MockResponse {
        Record(DefinitionRecord),
        NotFound,
        Status(u16),
        Hang,
    }

    /// Blueprints client double that records every call
    struct MockBlueprintsClient {
        response: MockResponse,
        calls: AtomicUsize,
        last_call: Mutex<Option<(BlueprintScope, String)>>,
    }

    impl MockBlueprintsClient {
        fn new(response: MockResponse) -> Self {
            Self {
                response,
                calls: AtomicUsize::new(0),
                last_call: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BlueprintsClient for MockBlueprintsClient {
        async fn get(&self, scope: BlueprintScope, name: &str) -> ClientResult<DefinitionRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_call.lock().unwrap() = Some((scope, name.to_string()));
            match &self.response {
                MockResponse::Record(record) => Ok(record.clone()),
                MockResponse::NotFound => Err(ClientError::NotFound {
                    resource: format!("Blueprint definition '{}'", name),
                }),
                MockResponse::Status(status) => Err(ClientError::Status {
                    url: "https://management.azure.com/test".to_string(),
                    status: *status,
                    body: "boom".to_string(),
                }),
                MockResponse::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(DefinitionRecord::default())
                }
            }
        }
    }

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    fn record_with_id(id: &str) -> DefinitionRecord {
        DefinitionRecord {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    const BLUEPRINT1_ID: &str =
        "/subscriptions/x/providers/Microsoft.Blueprint/blueprints/blueprint1";

    #[test]
    fn test_schema_declares_inputs_and_outputs() {
        let schema = blueprint_definition_schema();
        assert_eq!(schema.resource_type, "azurerm.blueprint_definition");

        let inputs: Vec<&str> = schema.inputs().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(inputs, vec!["name", "read_timeout", "scope"]);
        let required: Vec<&str> = schema
            .inputs()
            .iter()
            .filter(|a| a.required)
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(required, vec!["name", "scope"]);

        let computed: Vec<&str> = schema.computed().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            computed,
            vec![
                "description",
                "display_name",
                "last_modified",
                "target_scope",
                "time_created",
                "type",
                "versions"
            ]
        );
    }

    #[test]
    fn test_request_from_attributes() {
        let map = attrs(&[("name", "blueprint1"), ("scope", "subscription")]);
        let request = LookupRequest::from_attributes(&map).unwrap();
        assert_eq!(request.name(), "blueprint1");
        assert_eq!(request.scope(), BlueprintScope::Subscription);
        assert_eq!(request.timeouts(&Timeouts::default()), Timeouts::default());
    }

    #[test]
    fn test_request_read_timeout_overrides_default() {
        let map = attrs(&[
            ("name", "blueprint1"),
            ("scope", "subscription"),
            ("read_timeout", "1m30s"),
        ]);
        let request = LookupRequest::from_attributes(&map).unwrap();
        let defaults = Timeouts::default().with_read(Duration::from_secs(10));
        assert_eq!(request.timeouts(&defaults).read, Duration::from_secs(90));
    }

    #[test]
    fn test_request_rejects_invalid_read_timeout() {
        let map = attrs(&[
            ("name", "blueprint1"),
            ("scope", "subscription"),
            ("read_timeout", "soon"),
        ]);
        let err = LookupRequest::from_attributes(&map).unwrap_err();
        assert!(matches!(err, BlueprintDefinitionError::Validation(_)));
        assert!(err.to_string().contains("read_timeout"));

        let mut map = attrs(&[("name", "blueprint1"), ("scope", "subscription")]);
        map.insert("read_timeout".to_string(), Value::Int(30));
        let err = LookupRequest::from_attributes(&map).unwrap_err();
        assert_eq!(err.to_string(), "Attribute 'read_timeout' must be a string");
    }

    #[test]
    fn test_request_rejects_empty_name() {
        let map = attrs(&[("name", ""), ("scope", "subscription")]);
        let err = LookupRequest::from_attributes(&map).unwrap_err();
        assert!(matches!(err, BlueprintDefinitionError::Validation(_)));
        assert!(err.to_string().contains("name"));

        assert!(matches!(
            LookupRequest::new("", BlueprintScope::Subscription),
            Err(BlueprintDefinitionError::Validation(_))
        ));
    }

    #[test]
    fn test_request_rejects_unknown_scope() {
        let map = attrs(&[("name", "bp"), ("scope", "invalidScope")]);
        let err = LookupRequest::from_attributes(&map).unwrap_err();
        assert!(matches!(err, BlueprintDefinitionError::Validation(_)));
        assert!(err.to_string().contains("invalidScope"));
    }

    #[test]
    fn test_request_extraction_errors() {
        let err = LookupRequest::from_attributes(&attrs(&[("scope", "subscription")])).unwrap_err();
        assert!(matches!(
            err,
            BlueprintDefinitionError::Extraction { ref attribute, .. } if attribute == "name"
        ));

        let mut map = attrs(&[("name", "bp")]);
        map.insert("scope".to_string(), Value::Int(1));
        let err = LookupRequest::from_attributes(&map).unwrap_err();
        assert_eq!(err.to_string(), "Attribute 'scope' must be a string");
    }

    #[test]
    fn test_request_rejects_computed_inputs() {
        let map = attrs(&[
            ("name", "bp"),
            ("scope", "subscription"),
            ("display_name", "x"),
        ]);
        assert!(matches!(
            LookupRequest::from_attributes(&map),
            Err(BlueprintDefinitionError::Validation(_))
        ));
    }

    // Absent optional fields stay empty
    #[tokio::test]
    async fn test_read_projects_present_fields() {
        let client = MockBlueprintsClient::new(MockResponse::Record(DefinitionRecord {
            id: Some(BLUEPRINT1_ID.to_string()),
            properties: DefinitionProperties {
                display_name: Some("Blueprint One".to_string()),
                versions: Some(vec!["v1".to_string(), "v2".to_string()]),
                ..Default::default()
            },
            ..Default::default()
        }));
        let request = LookupRequest::new("blueprint1", BlueprintScope::Subscription).unwrap();

        let definition = read_blueprint_definition(&client, &request, &Timeouts::default())
            .await
            .unwrap();

        assert_eq!(definition.id, BLUEPRINT1_ID);
        assert_eq!(definition.display_name, "Blueprint One");
        assert_eq!(definition.versions, vec!["v1", "v2"]);
        assert_eq!(definition.description, "");
        assert_eq!(definition.target_scope, "");
        assert_eq!(client.calls(), 1);
        assert_eq!(
            *client.last_call.lock().unwrap(),
            Some((BlueprintScope::Subscription, "blueprint1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_read_copies_every_field() {
        let client = MockBlueprintsClient::new(MockResponse::Record(DefinitionRecord {
            id: Some(BLUEPRINT1_ID.to_string()),
            name: Some("blueprint1".to_string()),
            resource_type: Some("Microsoft.Blueprint/blueprints".to_string()),
            properties: DefinitionProperties {
                description: Some("Base policies".to_string()),
                display_name: Some("Blueprint One".to_string()),
                target_scope: Some("subscription".to_string()),
                versions: Some(vec!["v1".to_string()]),
                status: DefinitionStatus {
                    time_created: Some(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()),
                    last_modified: Some(Utc.with_ymd_and_hms(2020, 2, 3, 4, 5, 6).unwrap()),
                },
            },
        }));
        let request = LookupRequest::new("blueprint1", BlueprintScope::Subscription).unwrap();

        let definition = read_blueprint_definition(&client, &request, &Timeouts::default())
            .await
            .unwrap();

        assert_eq!(definition.description, "Base policies");
        assert_eq!(definition.resource_type, "Microsoft.Blueprint/blueprints");
        assert_eq!(definition.time_created, "2020-01-02T03:04:05Z");
        assert_eq!(definition.last_modified, "2020-02-03T04:05:06Z");
    }

    #[tokio::test]
    async fn test_read_sparse_record_renders_timestamps() {
        let client = MockBlueprintsClient::new(MockResponse::Record(record_with_id("/id")));
        let request = LookupRequest::new("bp", BlueprintScope::ManagementGroup).unwrap();

        let definition = read_blueprint_definition(&client, &request, &Timeouts::default())
            .await
            .unwrap();

        assert_eq!(definition.id, "/id");
        assert_eq!(definition.description, "");
        assert_eq!(definition.display_name, "");
        assert_eq!(definition.resource_type, "");
        assert!(definition.versions.is_empty());
        assert_eq!(definition.last_modified, "1970-01-01T00:00:00Z");
        assert_eq!(definition.time_created, "1970-01-01T00:00:00Z");
    }

    // Not-found names both the blueprint and the scope
    #[tokio::test]
    async fn test_read_not_found() {
        let client = MockBlueprintsClient::new(MockResponse::NotFound);
        let request = LookupRequest::new("missing", BlueprintScope::ManagementGroup).unwrap();

        let err = read_blueprint_definition(&client, &request, &Timeouts::default())
            .await
            .unwrap_err();

        assert!(matches!(err, BlueprintDefinitionError::NotFound { .. }));
        let message = err.to_string();
        assert!(message.contains("missing"));
        assert!(message.contains("managementGroup"));
    }

    #[tokio::test]
    async fn test_read_status_404_is_not_found() {
        let client = MockBlueprintsClient::new(MockResponse::Status(404));
        let request = LookupRequest::new("missing", BlueprintScope::Subscription).unwrap();

        let err = read_blueprint_definition(&client, &request, &Timeouts::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BlueprintDefinitionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_read_failed_wraps_cause() {
        use std::error::Error;

        let client = MockBlueprintsClient::new(MockResponse::Status(500));
        let request = LookupRequest::new("blueprint1", BlueprintScope::Subscription).unwrap();

        let err = read_blueprint_definition(&client, &request, &Timeouts::default())
            .await
            .unwrap_err();

        assert!(matches!(err, BlueprintDefinitionError::ReadFailed { .. }));
        let message = err.to_string();
        assert!(message.contains("blueprint1"));
        assert!(message.contains("subscription"));
        assert!(message.contains("500"));
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn test_read_missing_identifier() {
        for id in [None, Some(String::new())] {
            let client = MockBlueprintsClient::new(MockResponse::Record(DefinitionRecord {
                id,
                properties: DefinitionProperties {
                    description: Some("still fails".to_string()),
                    display_name: Some("Blueprint One".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            }));
            let request = LookupRequest::new("blueprint1", BlueprintScope::Subscription).unwrap();

            let err = read_blueprint_definition(&client, &request, &Timeouts::default())
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                BlueprintDefinitionError::MissingIdentifier { ref name } if name == "blueprint1"
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_times_out() {
        let client = MockBlueprintsClient::new(MockResponse::Hang);
        let request = LookupRequest::new("slow", BlueprintScope::Subscription).unwrap();
        let timeouts = Timeouts::default().with_read(Duration::from_secs(5));

        let err = read_blueprint_definition(&client, &request, &timeouts)
            .await
            .unwrap_err();

        match err {
            BlueprintDefinitionError::TimedOut { timeout, .. } => {
                assert_eq!(timeout, Duration::from_secs(5))
            }
            other => panic!("Expected TimedOut, got {:?}", other),
        }
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_into_state() {
        let request = LookupRequest::new("blueprint1", BlueprintScope::Subscription).unwrap();
        let definition = BlueprintDefinition {
            id: BLUEPRINT1_ID.to_string(),
            display_name: "Blueprint One".to_string(),
            versions: vec!["v1".to_string()],
            ..Default::default()
        };

        let state = definition.into_state(ResourceId::new(DATA_SOURCE_TYPE, "example"), &request);

        assert_eq!(state.identifier.as_deref(), Some(BLUEPRINT1_ID));
        assert_eq!(state.attributes["display_name"], Value::from("Blueprint One"));
        assert_eq!(state.attributes["description"], Value::from(""));
        assert_eq!(state.attributes["versions"], Value::string_list(["v1"]));
        assert_eq!(state.attributes["scope"], Value::from("subscription"));

        let schema = blueprint_definition_schema();
        for (key, value) in &state.attributes {
            let attr = &schema.attributes[key];
            assert!(attr.attr_type.validate(value).is_ok(), "{} has wrong type", key);
        }
    }
}
