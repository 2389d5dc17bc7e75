//! Which instances the rendered files describe.

use std::fmt;

/// Instance filter, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every instance in the project.
    AllInstances,

    /// Instances labelled with this stack name.
    Stack(String),

    /// Instances of the named services of a stack, in configured order.
    StackServices { stack: String, services: Vec<String> },
}

impl Scope {
    /// Build a scope from the optional stack and service filters.
    ///
    /// Returns `None` when services are given without a stack. Duplicate
    /// service names keep their first position.
    pub fn from_filters(stack: Option<String>, services: Vec<String>) -> Option<Self> {
        match (stack, services.is_empty()) {
            (None, true) => Some(Self::AllInstances),
            (None, false) => None,
            (Some(stack), true) => Some(Self::Stack(stack)),
            (Some(stack), false) => {
                let mut unique: Vec<String> = Vec::with_capacity(services.len());
                for service in services {
                    if !unique.contains(&service) {
                        unique.push(service);
                    }
                }
                Some(Self::StackServices {
                    stack,
                    services: unique,
                })
            }
        }
    }

    /// Stack filter, if any.
    pub fn stack(&self) -> Option<&str> {
        match self {
            Self::AllInstances => None,
            Self::Stack(stack) | Self::StackServices { stack, .. } => Some(stack),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllInstances => write!(f, "all"),
            Self::Stack(stack) => write!(f, "stack:{stack}"),
            Self::StackServices { stack, services } => {
                write!(f, "stack:{stack} services:{}", services.join(","))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_filters() {
        assert_eq!(Scope::from_filters(None, vec![]), Some(Scope::AllInstances));
        assert_eq!(
            Scope::from_filters(Some("web".into()), vec![]),
            Some(Scope::Stack("web".into()))
        );
        assert_eq!(Scope::from_filters(None, vec!["app".into()]), None);
    }

    #[test]
    fn test_duplicate_services_keep_first_position() {
        let scope = Scope::from_filters(
            Some("web".into()),
            vec!["b".into(), "a".into(), "b".into()],
        )
        .unwrap();
        assert_eq!(
            scope,
            Scope::StackServices {
                stack: "web".into(),
                services: vec!["b".into(), "a".into()],
            }
        );
        assert_eq!(scope.stack(), Some("web"));
        assert_eq!(scope.to_string(), "stack:web services:b,a");
    }
}
