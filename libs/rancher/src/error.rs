//! Client errors.

use thiserror::Error;

/// Any failure talking to the Rancher API.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connection refused, timeout, TLS failure, ...
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-2xx status.
    #[error("request to {url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body is not the expected JSON.
    #[error("malformed response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// A resource lacks the link needed to follow it.
    #[error("{resource} has no `{rel}` link")]
    MissingLink { resource: String, rel: &'static str },

    /// The key pair cannot be sent as an `Authorization` header.
    #[error("access key or secret key contains characters not allowed in a header")]
    InvalidCredentials,

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
