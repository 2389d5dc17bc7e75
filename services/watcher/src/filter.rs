//! Event filter: decides whether a frame warrants a re-render.
//!
//! Stateless; each frame is judged on its own against the scope.

use std::fmt;

use rgen_events::{ChangeEvent, InstanceState, ResourceChange, CONTAINER};

use crate::scope::Scope;

/// Why a frame was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Not `resource.change`, or no data.
    NotResourceChange,
    /// Frame or resource could not be parsed.
    Malformed,
    NotContainer,
    /// State other than running, stopped or removed.
    UnsettledState,
    /// No labels on a stack-scoped watch.
    Unlabeled,
    OtherStack,
    OtherService,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotResourceChange => "not_resource_change",
            Self::Malformed => "malformed",
            Self::NotContainer => "not_container",
            Self::UnsettledState => "unsettled_state",
            Self::Unlabeled => "unlabeled",
            Self::OtherStack => "other_stack",
            Self::OtherService => "other_service",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change that should trigger resolve and render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedChange {
    pub resource_id: String,
    pub state: InstanceState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Matched(MatchedChange),
    Dropped(DropReason),
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }
}

/// Judge a raw text frame.
pub fn evaluate_frame(scope: &Scope, frame: &str) -> Verdict {
    match ChangeEvent::from_frame(frame) {
        Ok(event) => evaluate(scope, &event),
        Err(_) => Verdict::Dropped(DropReason::Malformed),
    }
}

/// Judge a parsed event.
pub fn evaluate(scope: &Scope, event: &ChangeEvent) -> Verdict {
    if !event.is_resource_change() {
        return Verdict::Dropped(DropReason::NotResourceChange);
    }

    let Ok(change) = event.resource() else {
        return Verdict::Dropped(DropReason::Malformed);
    };

    if change.header.kind != CONTAINER {
        return Verdict::Dropped(DropReason::NotContainer);
    }
    if !change.header.state.is_settled() {
        return Verdict::Dropped(DropReason::UnsettledState);
    }

    let (stack, services) = match scope {
        // Only the header matters without a stack filter.
        Scope::AllInstances => return matched(&change),
        Scope::Stack(stack) => (stack, None),
        Scope::StackServices { stack, services } => (stack, Some(services)),
    };

    let Ok(instance) = change.instance() else {
        return Verdict::Dropped(DropReason::Malformed);
    };
    if instance.labels.is_none() {
        return Verdict::Dropped(DropReason::Unlabeled);
    }
    if instance.stack_name() != Some(stack.as_str()) {
        return Verdict::Dropped(DropReason::OtherStack);
    }
    if let Some(services) = services {
        match instance.stack_service_name() {
            Some(service) if services.iter().any(|s| s == service) => {}
            _ => return Verdict::Dropped(DropReason::OtherService),
        }
    }

    matched(&change)
}

fn matched(change: &ResourceChange) -> Verdict {
    Verdict::Matched(MatchedChange {
        resource_id: change.id().to_string(),
        state: change.header.state.clone(),
    })
}
