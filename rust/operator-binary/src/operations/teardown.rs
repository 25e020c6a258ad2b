//! Deletes everything an `AxonOpsCassandra` created before letting it go.
//!
//! The targets are derived from the object name alone, so the teardown also cleans up after
//! tiers whose configuration has since changed, e.g. a dashboard Ingress that was disabled.
use snafu::{ResultExt, Snafu};
use stackable_operator::{
    k8s_openapi::api::{
        apps::v1::{Deployment, StatefulSet},
        core::v1::Service,
        networking::v1::Ingress,
    },
    kube::{self, ResourceExt},
};

use crate::{
    crd::{AxonOpsCassandra, Tier, tier::headless_service_name},
    operations::finalizer::{self, FinalizerState},
    store::{ResourceStore, SubordinateKind},
};

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("failed to delete {kind} {name}"))]
    DeleteSubordinate {
        source: kube::Error,
        kind: SubordinateKind,
        name: String,
    },

    #[snafu(display("failed to remove the finalizer"))]
    DetachFinalizer { source: kube::Error },
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TeardownTarget {
    pub kind: SubordinateKind,
    pub name: String,
}

impl TeardownTarget {
    fn new(kind: SubordinateKind, name: String) -> Self {
        Self { kind, name }
    }
}

/// Every object that may exist for the `AxonOpsCassandra` named `composite_name`, in deletion order
pub fn teardown_targets(composite_name: &str) -> Vec<TeardownTarget> {
    let name = |tier: Tier| tier.object_name(composite_name);
    vec![
        TeardownTarget::new(SubordinateKind::StatefulSet, name(Tier::SearchIndex)),
        TeardownTarget::new(SubordinateKind::Service, name(Tier::SearchIndex)),
        TeardownTarget::new(SubordinateKind::StatefulSet, name(Tier::Database)),
        TeardownTarget::new(SubordinateKind::Service, name(Tier::Database)),
        TeardownTarget::new(
            SubordinateKind::Service,
            headless_service_name(composite_name),
        ),
        TeardownTarget::new(SubordinateKind::StatefulSet, name(Tier::Server)),
        TeardownTarget::new(SubordinateKind::Service, name(Tier::Server)),
        TeardownTarget::new(SubordinateKind::Deployment, name(Tier::Dashboard)),
        TeardownTarget::new(SubordinateKind::Service, name(Tier::Dashboard)),
        TeardownTarget::new(SubordinateKind::Ingress, name(Tier::Dashboard)),
    ]
}

/// Deletes all [`teardown_targets`] and then detaches the finalizer.
///
/// The first failing deletion aborts the teardown with the finalizer still attached, the next
/// attempt starts over. Objects that are already gone count as deleted.
pub async fn teardown(store: &impl ResourceStore, axoncass: &AxonOpsCassandra) -> Result<()> {
    let namespace = axoncass.namespace().unwrap_or_default();

    for target in teardown_targets(&axoncass.name_any()) {
        tracing::debug!(kind = %target.kind, name = %target.name, "Deleting subordinate");
        delete_target(store, &target, &namespace)
            .await
            .with_context(|_| DeleteSubordinateSnafu {
                kind: target.kind,
                name: target.name.clone(),
            })?;
    }

    if FinalizerState::of(axoncass) == FinalizerState::Attached {
        store
            .replace(&finalizer::detach(axoncass))
            .await
            .context(DetachFinalizerSnafu)?;
        tracing::info!("Removed finalizer, all subordinates are deleted");
    }
    Ok(())
}

async fn delete_target(
    store: &impl ResourceStore,
    target: &TeardownTarget,
    namespace: &str,
) -> Result<(), kube::Error> {
    let name = target.name.as_str();
    match target.kind {
        SubordinateKind::StatefulSet => store.delete::<StatefulSet>(name, namespace).await,
        SubordinateKind::Deployment => store.delete::<Deployment>(name, namespace).await,
        SubordinateKind::Service => store.delete::<Service>(name, namespace).await,
        SubordinateKind::Ingress => store.delete::<Ingress>(name, namespace).await,
    }
}
