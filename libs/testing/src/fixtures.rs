//! JSON fixtures shaped like Rancher v1 API objects.

use rgen_events::Instance;
use serde_json::{json, Value};

/// A labelled container in `stack/service`.
pub fn container(id: &str, state: &str, stack: &str, service: &str) -> Value {
    json!({
        "id": id,
        "type": "container",
        "state": state,
        "name": format!("{stack}_{service}_{id}"),
        "labels": {
            "io.rancher.stack.name": stack,
            "io.rancher.stack_service.name": format!("{stack}/{service}")
        }
    })
}

/// A system container without labels (network agent and friends).
pub fn unlabeled_container(id: &str, state: &str) -> Value {
    json!({
        "id": id,
        "type": "container",
        "state": state,
        "labels": null
    })
}

/// Parse a fixture into an `Instance`.
pub fn instance(value: Value) -> Instance {
    serde_json::from_value(value).expect("fixture is a valid instance")
}

/// A subscription frame with the given name and data.
pub fn event_frame(name: &str, data: Value) -> String {
    json!({ "name": name, "data": data }).to_string()
}

/// A `resource.change` frame for `resource`.
pub fn resource_change(resource: Value) -> String {
    event_frame("resource.change", json!({ "resource": resource }))
}
