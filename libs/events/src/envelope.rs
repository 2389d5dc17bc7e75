//! Change-event envelope - the frame pushed over the subscription socket.

use serde::Deserialize;
use serde_json::Value;

use crate::error::EventError;
use crate::types::{Instance, InstanceState, ResourceId};

/// Event name the watcher subscribes to.
pub const RESOURCE_CHANGE: &str = "resource.change";

/// Resource type of container instances.
pub const CONTAINER: &str = "container";

/// A frame received on the subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEvent {
    /// Event name (e.g. `resource.change`, `ping`).
    pub name: String,

    /// Event payload; shape depends on the event name.
    #[serde(default)]
    pub data: Value,
}

impl ChangeEvent {
    /// Parse a text frame.
    pub fn from_frame(frame: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// True for `resource.change` events that carry data.
    pub fn is_resource_change(&self) -> bool {
        self.name == RESOURCE_CHANGE && !is_empty(&self.data)
    }

    /// Extract the changed resource from `data.resource`.
    ///
    /// Only the header is parsed here; see [`ResourceChange::instance`].
    pub fn resource(&self) -> Result<ResourceChange, EventError> {
        let resource = self
            .data
            .get("resource")
            .ok_or(EventError::MissingResource)?;

        let header = ResourceHeader::deserialize(resource).map_err(|e| {
            EventError::InvalidResource {
                kind: "unknown".to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(ResourceChange {
            header,
            resource: resource.clone(),
        })
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

/// Fields common to every resource in a change event.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceHeader {
    #[serde(default)]
    pub id: Option<ResourceId>,

    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub state: InstanceState,
}

/// The resource a `resource.change` event refers to.
#[derive(Debug, Clone)]
pub struct ResourceChange {
    pub header: ResourceHeader,

    /// The raw resource object.
    pub resource: Value,
}

impl ResourceChange {
    /// Resource id for log context.
    pub fn id(&self) -> &str {
        self.header.id.as_ref().map(ResourceId::as_str).unwrap_or("-")
    }

    /// Decode the resource as a container instance.
    pub fn instance(&self) -> Result<Instance, EventError> {
        if self.header.kind != CONTAINER {
            return Err(EventError::InvalidResource {
                kind: self.header.kind.clone(),
                reason: "not a container".to_string(),
            });
        }
        Instance::deserialize(&self.resource).map_err(|e| EventError::InvalidResource {
            kind: self.header.kind.clone(),
            reason: e.to_string(),
        })
    }
}
