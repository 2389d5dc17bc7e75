//! Connection settings: where the API lives and how to authenticate.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};

/// Event names requested on the subscription socket.
const SUBSCRIBE_QUERY: &str = "eventNames=resource.change&include=services";

/// Location of a Rancher project API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Use `https` / `wss`.
    pub ssl: bool,
    pub project_id: String,
}

impl Endpoint {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        ssl: bool,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            ssl,
            project_id: project_id.into(),
        }
    }

    /// Default port for the transport: 443 with TLS, 80 without.
    pub fn default_port(ssl: bool) -> u16 {
        if ssl {
            443
        } else {
            80
        }
    }

    pub fn http_scheme(&self) -> &'static str {
        if self.ssl {
            "https"
        } else {
            "http"
        }
    }

    pub fn ws_scheme(&self) -> &'static str {
        if self.ssl {
            "wss"
        } else {
            "ws"
        }
    }

    /// Base URL of the project API, with a trailing slash.
    pub fn api_base(&self) -> String {
        format!(
            "{}://{}:{}/v1/projects/{}/",
            self.http_scheme(),
            self.host,
            self.port,
            self.project_id
        )
    }

    /// Subscription URL for `resource.change` events with services included.
    pub fn subscribe_url(&self) -> String {
        format!(
            "{}://{}:{}/v1/projects/{}/subscribe?{}",
            self.ws_scheme(),
            self.host,
            self.port,
            self.project_id,
            SUBSCRIBE_QUERY
        )
    }
}

/// A value that must not show up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// API key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: Secret,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: Secret::new(secret_key),
        }
    }

    /// base64 of `<access>:<secret>`.
    pub fn basic_token(&self) -> Secret {
        Secret(STANDARD.encode(format!(
            "{}:{}",
            self.access_key,
            self.secret_key.expose()
        )))
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> Secret {
        Secret(format!("Basic {}", self.basic_token().expose()))
    }
}
