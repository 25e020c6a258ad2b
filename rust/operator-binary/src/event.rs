//! Kubernetes events recorded against an `AxonOpsCassandra`, the user facing feedback of each
//! reconciliation.
use std::future::Future;

use stackable_operator::kube::{
    Resource,
    runtime::events::{Event, EventType, Recorder},
};

use crate::crd::{AxonOpsCassandra, Tier};

#[derive(Clone, Debug, PartialEq)]
pub enum AxonOpsEvent {
    /// Every document of the tier was submitted
    Applied { tier: Tier },
    RenderFailed { tier: Tier, message: String },
    ApplyFailed { tier: Tier, message: String },
    Reconciled,
    /// All subordinates are gone and the finalizer was removed
    Deleted,
    TeardownFailed { message: String },
}

impl AxonOpsEvent {
    pub fn reason(&self) -> &'static str {
        match self {
            AxonOpsEvent::Applied { .. } => "Applied",
            AxonOpsEvent::RenderFailed { .. } => "RenderFailed",
            AxonOpsEvent::ApplyFailed { .. } => "ApplyFailed",
            AxonOpsEvent::Reconciled => "Reconciled",
            AxonOpsEvent::Deleted => "Deleted",
            AxonOpsEvent::TeardownFailed { .. } => "TeardownFailed",
        }
    }

    pub fn note(&self) -> String {
        match self {
            AxonOpsEvent::Applied { tier } => format!("Applied the {tier} tier"),
            AxonOpsEvent::RenderFailed { tier, message } => {
                format!("Failed to render the {tier} tier: {message}")
            }
            AxonOpsEvent::ApplyFailed { tier, message } => {
                format!("Failed to apply the {tier} tier: {message}")
            }
            AxonOpsEvent::Reconciled => "All tiers applied".to_string(),
            AxonOpsEvent::Deleted => "Deleted all subordinate resources".to_string(),
            AxonOpsEvent::TeardownFailed { message } => {
                format!("Failed to delete subordinate resources: {message}")
            }
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            AxonOpsEvent::RenderFailed { .. }
                | AxonOpsEvent::ApplyFailed { .. }
                | AxonOpsEvent::TeardownFailed { .. }
        )
    }

    fn action(&self) -> &'static str {
        match self {
            AxonOpsEvent::TeardownFailed { .. } | AxonOpsEvent::Deleted => "Teardown",
            _ => "Reconcile",
        }
    }
}

pub trait EventSink: Send + Sync {
    /// Publishing is best effort, failures are only logged.
    fn publish(
        &self,
        axoncass: &AxonOpsCassandra,
        event: AxonOpsEvent,
    ) -> impl Future<Output = ()> + Send;
}

impl EventSink for Recorder {
    async fn publish(&self, axoncass: &AxonOpsCassandra, event: AxonOpsEvent) {
        let kube_event = Event {
            type_: if event.is_warning() {
                EventType::Warning
            } else {
                EventType::Normal
            },
            reason: event.reason().to_string(),
            note: Some(event.note()),
            action: event.action().to_string(),
            secondary: None,
        };
        if let Err(error) = Recorder::publish(self, &kube_event, &axoncass.object_ref(&())).await
        {
            tracing::warn!(
                reason = event.reason(),
                error = &error as &dyn std::error::Error,
                "Failed to publish event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_severity() {
        let warnings = [
            AxonOpsEvent::RenderFailed {
                tier: Tier::Dashboard,
                message: "boom".to_string(),
            },
            AxonOpsEvent::ApplyFailed {
                tier: Tier::Server,
                message: "boom".to_string(),
            },
            AxonOpsEvent::TeardownFailed {
                message: "boom".to_string(),
            },
        ];
        assert!(warnings.iter().all(AxonOpsEvent::is_warning));

        let normal = [
            AxonOpsEvent::Applied {
                tier: Tier::Database,
            },
            AxonOpsEvent::Reconciled,
            AxonOpsEvent::Deleted,
        ];
        assert!(!normal.iter().any(AxonOpsEvent::is_warning));
    }

    #[test]
    fn test_note_names_tier() {
        let event = AxonOpsEvent::RenderFailed {
            tier: Tier::SearchIndex,
            message: "invalid label".to_string(),
        };
        assert_eq!(event.reason(), "RenderFailed");
        assert_eq!(
            event.note(),
            "Failed to render the search-index tier: invalid label"
        );
    }
}
