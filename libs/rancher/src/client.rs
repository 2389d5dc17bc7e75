//! Rancher v1 API client.
//!
//! Provides the read operations rancher-gen needs:
//! - Listing instances (environment-wide, per stack, per service)
//! - Looking up stacks and services by name
//! - Resolving the service a changed container belongs to

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use rgen_events::{Collection, Instance, InstanceState, Service, Stack};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::endpoint::{Credentials, Endpoint};
use crate::error::ConnectionError;

/// Read operations against a Rancher project.
#[async_trait]
pub trait RancherApi: Send + Sync {
    /// All instances in the project.
    async fn list_all_instances(&self) -> Result<Vec<Instance>, ConnectionError>;

    /// Instances of a service, via its `instances` link.
    async fn list_instances_for_service(
        &self,
        service: &Service,
    ) -> Result<Vec<Instance>, ConnectionError>;

    /// Stack with exactly this name.
    async fn find_stack_by_name(&self, stack_name: &str) -> Result<Option<Stack>, ConnectionError>;

    /// Service of `stack` with exactly this name.
    async fn find_service_by_name(
        &self,
        stack: &Stack,
        service_name: &str,
    ) -> Result<Option<Service>, ConnectionError>;

    /// Instances labelled with `stack_name`; empty when none match.
    async fn list_instances_for_stack(
        &self,
        stack_name: &str,
    ) -> Result<Vec<Instance>, ConnectionError> {
        let instances = self.list_all_instances().await?;
        Ok(instances
            .into_iter()
            .filter(|instance| instance.stack_name() == Some(stack_name))
            .collect())
    }

    /// Service a changed container belongs to.
    ///
    /// Running and stopped containers embed their services. Removed ones do
    /// not, so the service is looked up by the stack and service labels.
    async fn resolve_service_from_resource(
        &self,
        resource: &Instance,
    ) -> Result<Option<Service>, ConnectionError> {
        match &resource.state {
            state if state.carries_services() => Ok(resource.first_service().cloned()),
            InstanceState::Removed => {
                let (Some(stack_name), Some(service_name)) =
                    (resource.stack_name(), resource.stack_service_name())
                else {
                    return Ok(None);
                };

                let Some(stack) = self.find_stack_by_name(stack_name).await? else {
                    return Ok(None);
                };
                self.find_service_by_name(&stack, service_name).await
            }
            _ => Ok(None),
        }
    }
}

/// HTTP implementation of `RancherApi`.
#[derive(Debug, Clone)]
pub struct RancherClient {
    client: reqwest::Client,
    base_url: String,
}

impl RancherClient {
    /// Create a client for `endpoint` authenticating with `credentials`.
    pub fn new(
        endpoint: &Endpoint,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut authorization = HeaderValue::from_str(credentials.authorization().expose())
            .map_err(|_| ConnectionError::InvalidCredentials)?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        let client = reqwest::Client::builder()
            .user_agent(concat!("rancher-gen/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(ConnectionError::Client)?;

        Ok(Self {
            client,
            base_url: endpoint.api_base(),
        })
    }

    /// Build a URL for a project-relative path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET a collection and return its items.
    async fn get_collection<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ConnectionError> {
        debug!(url = %url, ?query, "Fetching collection");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|source| ConnectionError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status = %status, "Rancher API request failed");
            return Err(ConnectionError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| ConnectionError::Transport {
                url: url.to_string(),
                source,
            })?;

        let collection: Collection<T> =
            serde_json::from_str(&body).map_err(|e| ConnectionError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        debug!(url = %url, count = collection.data.len(), "Fetched collection");
        Ok(collection.data)
    }
}

#[async_trait]
impl RancherApi for RancherClient {
    async fn list_all_instances(&self) -> Result<Vec<Instance>, ConnectionError> {
        self.get_collection(&self.url("instances"), &[]).await
    }

    async fn list_instances_for_service(
        &self,
        service: &Service,
    ) -> Result<Vec<Instance>, ConnectionError> {
        let url = service
            .instances_url()
            .ok_or_else(|| ConnectionError::MissingLink {
                resource: format!("service {}", service.id),
                rel: "instances",
            })?;
        self.get_collection(url, &[]).await
    }

    async fn find_stack_by_name(&self, stack_name: &str) -> Result<Option<Stack>, ConnectionError> {
        let stacks: Vec<Stack> = self
            .get_collection(&self.url("environments"), &[("name", stack_name)])
            .await?;
        Ok(stacks.into_iter().find(|stack| stack.name == stack_name))
    }

    async fn find_service_by_name(
        &self,
        stack: &Stack,
        service_name: &str,
    ) -> Result<Option<Service>, ConnectionError> {
        let url = stack
            .services_url()
            .ok_or_else(|| ConnectionError::MissingLink {
                resource: format!("stack {}", stack.name),
                rel: "services",
            })?;
        let services: Vec<Service> = self.get_collection(url, &[("name", service_name)]).await?;
        Ok(services
            .into_iter()
            .find(|service| service.name == service_name))
    }
}
