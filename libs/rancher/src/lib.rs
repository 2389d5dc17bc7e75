//! # rgen-rancher
//!
//! Read-only client for the Rancher v1 project API.
//!
//! The client resolves stacks, services and instance lists. It never
//! retries: a failed request surfaces as a `ConnectionError` and the caller
//! decides what an outage means.
//!
//! `RancherApi` is the seam the watcher depends on; `RancherClient` is the
//! HTTP implementation.

mod client;
mod endpoint;
mod error;

pub use client::{RancherApi, RancherClient};
pub use endpoint::{Credentials, Endpoint, Secret};
pub use error::ConnectionError;
