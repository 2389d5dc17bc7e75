//! rancher-gen watcher
//!
//! Keeps files rendered from Rancher metadata up to date. On startup every
//! template is rendered once; afterwards each relevant container change on
//! the project's event subscription triggers a fresh resolve and render,
//! followed by an optional notify command.
//!
//! ## Architecture
//!
//! - **Watch Loop**: Owns the subscription socket and reconnects with backoff
//! - **Filter**: Decides per frame whether the change is in scope
//! - **Dispatcher**: Runs one resolve and render task per matching change
//! - **Resolver**: Turns a `Scope` into the current instance list
//! - **Render Pipeline**: Renders templates, replaces files atomically, notifies

pub mod config;
pub mod dispatcher;
pub mod filter;
pub mod notify;
pub mod reconnect;
pub mod render;
pub mod resolver;
pub mod scope;
pub mod watch;

pub use config::{Cli, Config, ConfigError};
pub use dispatcher::{Dispatcher, Reconciliation};
pub use render::{RenderPipeline, RenderReport, TemplateJob};
pub use scope::Scope;
pub use watch::{SubscriptionError, WatchState, Watcher};
