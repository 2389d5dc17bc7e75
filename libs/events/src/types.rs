//! Rancher v1 resource types.
//!
//! Each resource keeps the fields rancher-gen inspects as typed members and
//! stores everything else in `fields`, so serializing a resource back for a
//! template yields the object the API returned.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Label Keys
// =============================================================================

/// Well-known Rancher label keys.
pub mod labels {
    /// Name of the stack a container belongs to.
    pub const STACK_NAME: &str = "io.rancher.stack.name";

    /// `<stack>/<service>` path of the service a container belongs to.
    pub const STACK_SERVICE_NAME: &str = "io.rancher.stack_service.name";
}

/// Label map attached to a resource.
pub type Labels = Map<String, Value>;

// =============================================================================
// Identifiers
// =============================================================================

/// Resource identifier.
///
/// Rancher ids are strings (`1i42`), but fixtures and older APIs also hand
/// out plain numbers; both are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct ResourceId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawId> for ResourceId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => Self(s),
            RawId::Number(n) => Self(n.to_string()),
        }
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl ResourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Instance State
// =============================================================================

/// Lifecycle state of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceState {
    Running,
    Stopped,
    Removed,
    /// Any transitional or unknown state (`starting`, `stopping`, `purged`, ...).
    Other(String),
}

impl InstanceState {
    /// States whose transitions change the set of instances a template sees.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Running | Self::Stopped | Self::Removed)
    }

    /// States for which the API embeds the owning services in the resource.
    pub fn carries_services(&self) -> bool {
        matches!(self, Self::Running | Self::Stopped)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Removed => "removed",
            Self::Other(s) => s,
        }
    }
}

impl Default for InstanceState {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for InstanceState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "removed" => Self::Removed,
            _ => Self::Other(s),
        }
    }
}

impl From<InstanceState> for String {
    fn from(state: InstanceState) -> Self {
        match state {
            InstanceState::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Links
// =============================================================================

/// Relation name to URL map (`links` on every v1 resource).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Links(Map<String, Value>);

impl Links {
    /// URL of the named relation, if present.
    pub fn get(&self, rel: &str) -> Option<&str> {
        self.0.get(rel).and_then(Value::as_str)
    }

    pub fn insert(&mut self, rel: impl Into<String>, url: impl Into<String>) {
        self.0.insert(rel.into(), Value::String(url.into()));
    }
}

// =============================================================================
// Resources
// =============================================================================

/// A container instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: ResourceId,

    /// Resource type (`container`, `networkAgent`, ...).
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub state: InstanceState,

    /// Labels; system containers such as network agents have none.
    #[serde(default)]
    pub labels: Option<Labels>,

    /// Owning services. Only embedded for running and stopped containers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<Service>>,

    /// Every other field returned by the API.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Instance {
    /// Value of a string label.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.as_ref()?.get(key)?.as_str()
    }

    /// Stack name from `io.rancher.stack.name`.
    pub fn stack_name(&self) -> Option<&str> {
        self.label(labels::STACK_NAME)
    }

    /// Service name: the second segment of `io.rancher.stack_service.name`.
    pub fn stack_service_name(&self) -> Option<&str> {
        self.label(labels::STACK_SERVICE_NAME)?
            .split('/')
            .nth(1)
            .filter(|s| !s.is_empty())
    }

    /// First embedded service.
    pub fn first_service(&self) -> Option<&Service> {
        self.services.as_ref()?.first()
    }
}

/// A service within a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: ResourceId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Service {
    /// URL listing this service's instances.
    pub fn instances_url(&self) -> Option<&str> {
        self.links.get("instances")
    }
}

/// A stack (called `environment` in the v1 API).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub id: ResourceId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Stack {
    /// URL listing this stack's services.
    pub fn services_url(&self) -> Option<&str> {
        self.links.get("services")
    }
}

/// List response wrapper.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Collection<T> {
    /// Items; `null` and a missing field both read as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<T>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn running_instance() -> Value {
        json!({
            "id": "1i42",
            "type": "container",
            "state": "running",
            "primaryIpAddress": "10.42.232.33",
            "labels": {
                "io.rancher.stack.name": "teststack",
                "io.rancher.stack_service.name": "teststack/hello"
            },
            "services": [{
                "id": "1s7",
                "name": "hello",
                "links": {"instances": "http://rancher/v1/services/1s7/instances"}
            }]
        })
    }

    #[test]
    fn test_instance_keeps_untyped_fields() {
        let instance: Instance = serde_json::from_value(running_instance()).unwrap();
        assert_eq!(instance.id.as_str(), "1i42");
        assert_eq!(instance.kind, "container");
        assert_eq!(instance.state, InstanceState::Running);
        assert_eq!(
            instance.fields.get("primaryIpAddress"),
            Some(&json!("10.42.232.33"))
        );

        let back = serde_json::to_value(&instance).unwrap();
        assert_eq!(back["primaryIpAddress"], "10.42.232.33");
        assert_eq!(back["state"], "running");
        assert_eq!(back["type"], "container");
    }

    #[test]
    fn test_label_helpers() {
        let instance: Instance = serde_json::from_value(running_instance()).unwrap();
        assert_eq!(instance.stack_name(), Some("teststack"));
        assert_eq!(instance.stack_service_name(), Some("hello"));
        assert_eq!(instance.first_service().unwrap().name, "hello");
        assert_eq!(
            instance.first_service().unwrap().instances_url(),
            Some("http://rancher/v1/services/1s7/instances")
        );
    }

    #[test]
    fn test_service_label_without_second_segment() {
        let instance: Instance = serde_json::from_value(json!({
            "id": "1i1",
            "labels": {"io.rancher.stack_service.name": "lonely"}
        }))
        .unwrap();
        assert_eq!(instance.stack_service_name(), None);
        assert_eq!(instance.stack_name(), None);
    }

    #[test]
    fn test_unlabeled_instance() {
        let instance: Instance =
            serde_json::from_value(json!({"id": "1i9", "type": "container", "labels": null}))
                .unwrap();
        assert!(instance.labels.is_none());
        assert_eq!(instance.stack_name(), None);
        assert_eq!(instance.state, InstanceState::default());
    }

    #[test]
    fn test_numeric_id_is_accepted() {
        let instance: Instance = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(instance.id.to_string(), "1");
        assert_eq!(serde_json::to_value(&instance).unwrap()["id"], "1");
    }

    #[test]
    fn test_instance_state_conversion() {
        assert_eq!(InstanceState::from("removed".to_string()), InstanceState::Removed);
        assert_eq!(
            InstanceState::from("starting".to_string()),
            InstanceState::Other("starting".to_string())
        );
        assert!(InstanceState::Stopped.is_settled());
        assert!(!InstanceState::Other("starting".to_string()).is_settled());
        assert!(InstanceState::Running.carries_services());
        assert!(!InstanceState::Removed.carries_services());
        assert_eq!(String::from(InstanceState::Other("purged".into())), "purged");
    }

    #[test]
    fn test_collection_null_data_is_empty() {
        let empty: Collection<Instance> = serde_json::from_value(json!({"data": null})).unwrap();
        assert!(empty.data.is_empty());

        let missing: Collection<Stack> = serde_json::from_value(json!({"type": "collection"})).unwrap();
        assert!(missing.data.is_empty());

        let stacks: Collection<Stack> = serde_json::from_value(json!({
            "data": [{"id": "1e1", "name": "web", "links": {"services": "http://x/services"}}]
        }))
        .unwrap();
        assert_eq!(stacks.data[0].services_url(), Some("http://x/services"));
    }
}
