//! Event dispatcher.
//!
//! Frames are filtered on the receive path; each match is handed to its own
//! task that re-resolves the scope and re-renders every job. Handlers share
//! nothing but read-only configuration.

use std::sync::Arc;

use rgen_rancher::RancherApi;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, Span};

use crate::filter::{evaluate_frame, Verdict};
use crate::render::{RenderPipeline, RenderReport};
use crate::resolver::InstanceResolver;
use crate::scope::Scope;

/// Outcome of one resolve and render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// What caused the pass (resource id, `prerender`, `resync`).
    pub trigger: String,
    pub instance_count: usize,
    pub report: RenderReport,
}

struct Shared {
    scope: Scope,
    resolver: InstanceResolver,
    pipeline: Arc<RenderPipeline>,
    /// Bound on in-flight handlers, when configured.
    limiter: Option<Semaphore>,
}

/// Cheaply cloneable handle used by the watch loop and its handlers.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub fn new(
        scope: Scope,
        api: Arc<dyn RancherApi>,
        pipeline: RenderPipeline,
        max_concurrent: Option<usize>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                scope,
                resolver: InstanceResolver::new(api),
                pipeline: Arc::new(pipeline),
                limiter: max_concurrent.map(|n| Semaphore::new(n.max(1))),
            }),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.shared.scope
    }

    /// Filter `frame` and spawn a handler when it matches.
    ///
    /// Never waits on the API or the filesystem.
    pub fn dispatch(&self, frame: &str) -> Option<JoinHandle<Reconciliation>> {
        match evaluate_frame(&self.shared.scope, frame) {
            Verdict::Dropped(reason) => {
                debug!(reason = %reason, "Ignoring event");
                None
            }
            Verdict::Matched(change) => {
                debug!(
                    resource_id = %change.resource_id,
                    state = %change.state.as_str(),
                    "Dispatching change"
                );
                Some(self.spawn_reconcile(change.resource_id))
            }
        }
    }

    /// Run `reconcile` on its own task.
    pub fn spawn_reconcile(&self, trigger: impl Into<String>) -> JoinHandle<Reconciliation> {
        let this = self.clone();
        let trigger = trigger.into();
        tokio::spawn(async move { this.reconcile(&trigger).await })
    }

    /// Resolve the scope and render every job.
    #[instrument(skip(self), fields(scope = %self.shared.scope))]
    pub async fn reconcile(&self, trigger: &str) -> Reconciliation {
        let _permit = match &self.shared.limiter {
            Some(limiter) => limiter.acquire().await.ok(),
            None => None,
        };

        let instances = self.shared.resolver.resolve(&self.shared.scope).await;
        let instance_count = instances.len();

        let pipeline = Arc::clone(&self.shared.pipeline);
        let job_count = pipeline.jobs().len();
        let span = Span::current();
        let report =
            match tokio::task::spawn_blocking(move || span.in_scope(|| pipeline.apply(&instances)))
                .await
            {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, "Render task failed");
                    RenderReport {
                        failed: job_count,
                        ..RenderReport::default()
                    }
                }
            };

        info!(
            instances = instance_count,
            rendered = report.rendered,
            failed = report.failed,
            notified = report.notified,
            "Reconciled"
        );

        Reconciliation {
            trigger: trigger.to_string(),
            instance_count,
            report,
        }
    }
}
