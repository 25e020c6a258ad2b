use stackable_operator::kube::ResourceExt;

use crate::crd::AxonOpsCassandra;

/// Blocks the removal of an `AxonOpsCassandra` until its subordinates are deleted
pub const FINALIZER: &str = "axonops.com/finalizer";

/// Whether [`FINALIZER`] is set on an `AxonOpsCassandra`.
///
/// Only the reconciler attaches it and only the teardown detaches it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FinalizerState {
    Attached,
    Detached,
}

impl FinalizerState {
    pub fn of(axoncass: &AxonOpsCassandra) -> Self {
        if axoncass.finalizers().iter().any(|finalizer| finalizer == FINALIZER) {
            FinalizerState::Attached
        } else {
            FinalizerState::Detached
        }
    }
}

/// Returns a copy of `axoncass` carrying the finalizer, ready to be persisted.
pub fn attach(axoncass: &AxonOpsCassandra) -> AxonOpsCassandra {
    let mut attached = axoncass.clone();
    if FinalizerState::of(&attached) == FinalizerState::Detached {
        attached.finalizers_mut().push(FINALIZER.to_string());
    }
    attached
}

/// Returns a copy of `axoncass` without the finalizer. Finalizers of other controllers are kept.
pub fn detach(axoncass: &AxonOpsCassandra) -> AxonOpsCassandra {
    let mut detached = axoncass.clone();
    detached
        .finalizers_mut()
        .retain(|finalizer| finalizer != FINALIZER);
    detached
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_and_detach() {
        let mut axoncass = AxonOpsCassandra::new("demo", Default::default());
        axoncass
            .finalizers_mut()
            .push("example.com/backup".to_string());
        assert_eq!(FinalizerState::of(&axoncass), FinalizerState::Detached);

        let attached = attach(&axoncass);
        assert_eq!(FinalizerState::of(&attached), FinalizerState::Attached);
        assert_eq!(attached.finalizers(), ["example.com/backup", FINALIZER]);

        // Attaching twice does not duplicate the marker
        assert_eq!(attach(&attached).finalizers().len(), 2);

        let detached = detach(&attached);
        assert_eq!(FinalizerState::of(&detached), FinalizerState::Detached);
        assert_eq!(detached.finalizers(), ["example.com/backup"]);
    }
}
