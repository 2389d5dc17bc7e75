//! wiremock server speaking the Rancher v1 project API.

use rgen_rancher::{Credentials, Endpoint};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PROJECT_ID: &str = "1a5";

/// Mocked Rancher API for end-to-end tests with the real HTTP client.
pub struct MockRancher {
    server: MockServer,
}

impl MockRancher {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Endpoint pointing at the mock server.
    pub fn endpoint(&self) -> Endpoint {
        let addr = self.server.address();
        Endpoint::new(addr.ip().to_string(), addr.port(), false, PROJECT_ID)
    }

    pub fn credentials() -> Credentials {
        Credentials::new("access", "secret")
    }

    /// Serve `instances` from the environment-wide instances endpoint.
    pub async fn mount_instances(&self, instances: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/projects/{PROJECT_ID}/instances")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": instances })))
            .mount(&self.server)
            .await;
    }

    /// Serve `stack` / `service` lookups and the service's instance list.
    pub async fn mount_service(&self, stack: &str, service: &str, instances: Vec<Value>) {
        let base = self.server.uri();
        let stack_id = format!("1e-{stack}");
        let service_id = format!("1s-{stack}-{service}");

        Mock::given(method("GET"))
            .and(path(format!("/v1/projects/{PROJECT_ID}/environments")))
            .and(query_param("name", stack))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "id": stack_id,
                    "name": stack,
                    "links": {"services": format!("{base}/v1/environments/{stack_id}/services")}
                }]
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/v1/environments/{stack_id}/services")))
            .and(query_param("name", service))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "id": service_id,
                    "name": service,
                    "links": {"instances": format!("{base}/v1/services/{service_id}/instances")}
                }]
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/v1/services/{service_id}/instances")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": instances })))
            .mount(&self.server)
            .await;
    }

    /// Answer every request with 503.
    pub async fn mount_outage(&self) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
            .mount(&self.server)
            .await;
    }
}
