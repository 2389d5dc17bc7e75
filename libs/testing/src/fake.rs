//! In-memory `RancherApi`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rgen_events::{Instance, Service, Stack};
use rgen_rancher::{ConnectionError, RancherApi};
use serde_json::json;

#[derive(Default)]
struct Topology {
    /// Environment-wide instance list.
    instances: Vec<Instance>,
    stacks: Vec<FakeStack>,
}

struct FakeStack {
    stack: Stack,
    services: Vec<(Service, Vec<Instance>)>,
}

/// Fake Rancher project.
///
/// Topology can be swapped at any time, which lets tests change the
/// "current" state between events. `set_offline(true)` makes every call
/// fail with a 503 `ConnectionError`.
#[derive(Default)]
pub struct FakeRancher {
    topology: Mutex<Topology>,
    offline: AtomicBool,
    requests: AtomicUsize,
}

impl FakeRancher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the environment-wide instance list.
    pub fn set_instances(&self, instances: Vec<Instance>) {
        self.lock().instances = instances;
    }

    /// Create (or replace) `service` in `stack` with the given instances.
    pub fn set_service(&self, stack_name: &str, service_name: &str, instances: Vec<Instance>) {
        let mut topology = self.lock();

        let index = match topology
            .stacks
            .iter()
            .position(|s| s.stack.name == stack_name)
        {
            Some(index) => index,
            None => {
                let stack = serde_json::from_value(json!({
                    "id": format!("1e-{stack_name}"),
                    "name": stack_name,
                    "links": {"services": format!("fake://stacks/{stack_name}/services")}
                }))
                .expect("valid stack");
                topology.stacks.push(FakeStack {
                    stack,
                    services: Vec::new(),
                });
                topology.stacks.len() - 1
            }
        };

        let service_id = format!("1s-{stack_name}-{service_name}");
        let service: Service = serde_json::from_value(json!({
            "id": service_id,
            "name": service_name,
            "links": {"instances": format!("fake://services/{service_id}/instances")}
        }))
        .expect("valid service");

        let services = &mut topology.stacks[index].services;
        services.retain(|(s, _)| s.name != service_name);
        services.push((service, instances));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of API calls served (including failed ones).
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Topology> {
        self.topology.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self, url: &str) -> Result<(), ConnectionError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ConnectionError::Status {
                url: url.to_string(),
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RancherApi for FakeRancher {
    async fn list_all_instances(&self) -> Result<Vec<Instance>, ConnectionError> {
        self.begin("fake://instances")?;
        Ok(self.lock().instances.clone())
    }

    async fn list_instances_for_service(
        &self,
        service: &Service,
    ) -> Result<Vec<Instance>, ConnectionError> {
        self.begin(service.instances_url().unwrap_or("fake://services"))?;
        let topology = self.lock();
        Ok(topology
            .stacks
            .iter()
            .flat_map(|s| s.services.iter())
            .find(|(s, _)| s.id == service.id)
            .map(|(_, instances)| instances.clone())
            .unwrap_or_default())
    }

    async fn find_stack_by_name(&self, stack_name: &str) -> Result<Option<Stack>, ConnectionError> {
        self.begin("fake://environments")?;
        Ok(self
            .lock()
            .stacks
            .iter()
            .find(|s| s.stack.name == stack_name)
            .map(|s| s.stack.clone()))
    }

    async fn find_service_by_name(
        &self,
        stack: &Stack,
        service_name: &str,
    ) -> Result<Option<Service>, ConnectionError> {
        self.begin(stack.services_url().unwrap_or("fake://services"))?;
        Ok(self
            .lock()
            .stacks
            .iter()
            .find(|s| s.stack.id == stack.id)
            .and_then(|s| s.services.iter().find(|(svc, _)| svc.name == service_name))
            .map(|(svc, _)| svc.clone()))
    }
}
