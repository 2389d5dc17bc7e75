//! Test support for rancher-gen.
//!
//! - `fixtures`: JSON builders for containers and subscription frames
//! - `FakeRancher`: in-memory `RancherApi` with switchable outages
//! - `MockRancher`: wiremock server speaking the v1 project API

pub mod fixtures;

mod fake;
mod mock_server;

pub use fake::FakeRancher;
pub use mock_server::MockRancher;
