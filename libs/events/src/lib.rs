//! # rgen-events
//!
//! Rancher resource model and change-event parsing for rancher-gen.
//!
//! ## Design Principles
//!
//! - Frames from the subscription are validated once, at the parse boundary
//! - Resources keep every API field so templates can reach anything Rancher returns
//! - Only the fields the watcher reasons about are typed
//!
//! ## Resources
//!
//! - `Instance`: a container (running, stopped, removed, ...)
//! - `Service`: a named group of instances within a stack
//! - `Stack`: a named group of services (an "environment" in the v1 API)
//! - `Collection`: the `{ "data": [...] }` wrapper every list endpoint returns
//!
//! ## Change Events
//!
//! `ChangeEvent` is the `{ name, data }` frame pushed over the subscription.
//! Only `resource.change` frames with non-empty data carry a resource.

mod envelope;
mod error;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use types::*;
