//! Scope to instance list resolution.
//!
//! Every call goes back to the API; nothing is cached between events.
//! Connection errors resolve to an empty list so a render still happens.

use std::sync::Arc;

use rgen_events::Instance;
use rgen_rancher::{ConnectionError, RancherApi};
use tracing::{debug, warn};

use crate::scope::Scope;

/// Resolves a `Scope` against the Rancher API.
#[derive(Clone)]
pub struct InstanceResolver {
    api: Arc<dyn RancherApi>,
}

impl InstanceResolver {
    pub fn new(api: Arc<dyn RancherApi>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &Arc<dyn RancherApi> {
        &self.api
    }

    /// Current instances for `scope`; empty on API failure.
    pub async fn resolve(&self, scope: &Scope) -> Vec<Instance> {
        match self.try_resolve(scope).await {
            Ok(instances) => {
                debug!(scope = %scope, count = instances.len(), "Resolved instances");
                instances
            }
            Err(e) => {
                warn!(scope = %scope, error = %e, "Instance resolution failed, using empty list");
                Vec::new()
            }
        }
    }

    async fn try_resolve(&self, scope: &Scope) -> Result<Vec<Instance>, ConnectionError> {
        match scope {
            Scope::AllInstances => self.api.list_all_instances().await,
            Scope::Stack(stack_name) => self.api.list_instances_for_stack(stack_name).await,
            Scope::StackServices { stack, services } => {
                self.resolve_services(stack, services).await
            }
        }
    }

    async fn resolve_services(
        &self,
        stack_name: &str,
        services: &[String],
    ) -> Result<Vec<Instance>, ConnectionError> {
        let Some(stack) = self.api.find_stack_by_name(stack_name).await? else {
            warn!(stack = %stack_name, "Stack not found");
            return Ok(Vec::new());
        };

        let mut instances = Vec::new();
        for service_name in services {
            let Some(service) = self.api.find_service_by_name(&stack, service_name).await? else {
                warn!(stack = %stack_name, service = %service_name, "Service not found, skipping");
                continue;
            };
            instances.extend(self.api.list_instances_for_service(&service).await?);
        }
        Ok(instances)
    }
}
