//! Ensures that the subordinates of an `AxonOpsCassandra` are kept in sync with its spec.
use std::{sync::Arc, time::Duration};

use snafu::{OptionExt, ResultExt, Snafu};
use stackable_operator::{
    client::Client,
    kube::{
        self, ResourceExt,
        core::{DeserializeGuard, error_boundary},
        runtime::{controller::Action, events::Recorder},
    },
    logging::controller::ReconcilerError,
    utils::cluster_info::KubernetesClusterInfo,
};
use strum::{EnumDiscriminants, IntoEnumIterator, IntoStaticStr};

use crate::{
    config,
    crd::{AxonOpsCassandra, Tier},
    event::{AxonOpsEvent, EventSink},
    operations::{
        finalizer::{self, FinalizerState},
        teardown,
    },
    render::{self, Manifest},
    store::{ResourceStore, StoredResource},
};

pub const FULL_CONTROLLER_NAME: &str = "axonopscassandra.axonops.com";

pub struct Ctx {
    pub client: Client,
    pub recorder: Recorder,
    /// Requeue delay after a successful reconciliation
    pub resync_interval: Duration,
    /// Requeue delay after a failed reconciliation
    pub error_requeue_interval: Duration,
}

#[derive(Snafu, Debug, EnumDiscriminants)]
#[strum_discriminants(derive(IntoStaticStr))]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[snafu(display("AxonOpsCassandra object is invalid"))]
    InvalidAxonOpsCassandra {
        source: error_boundary::InvalidObject,
    },

    #[snafu(display("object has no namespace"))]
    ObjectHasNoNamespace,

    #[snafu(display("failed to fetch AxonOpsCassandra {namespace}/{name}"))]
    GetAxonOpsCassandra {
        source: kube::Error,
        namespace: String,
        name: String,
    },

    #[snafu(display("failed to add the finalizer"))]
    AttachFinalizer { source: kube::Error },

    #[snafu(display("failed to delete the subordinate resources"))]
    Teardown { source: teardown::Error },

    #[snafu(display("failed to apply {kind} {name} of the {tier} tier"))]
    ApplySubordinate {
        source: kube::Error,
        tier: Tier,
        kind: &'static str,
        name: String,
    },

    #[snafu(display("failed to render the tiers {tiers:?}"))]
    RenderTiers { tiers: Vec<Tier> },
}

type Result<T, E = Error> = std::result::Result<T, E>;

impl ReconcilerError for Error {
    fn category(&self) -> &'static str {
        ErrorDiscriminants::from(self).into()
    }
}

/// What a reconciliation did
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PassOutcome {
    /// The object is gone, there is nothing left to do
    Absent,
    /// The object is being deleted and the finalizer is already detached
    Released,
    /// The finalizer was added, the subordinates follow on the next reconciliation
    FinalizerAttached,
    /// All subordinates were deleted and the finalizer was detached
    TornDown,
    /// All tiers were applied
    Applied,
}

pub async fn reconcile_axonops(
    axoncass: Arc<DeserializeGuard<AxonOpsCassandra>>,
    ctx: Arc<Ctx>,
) -> Result<Action> {
    tracing::info!("Starting reconcile");
    let axoncass = axoncass
        .0
        .as_ref()
        .map_err(error_boundary::InvalidObject::clone)
        .context(InvalidAxonOpsCassandraSnafu)?;
    let namespace = axoncass.namespace().context(ObjectHasNoNamespaceSnafu)?;

    let outcome = reconcile_pass(
        &ctx.client,
        &ctx.recorder,
        &ctx.client.kubernetes_cluster_info,
        &namespace,
        &axoncass.name_any(),
    )
    .await?;
    tracing::info!(?outcome, "Finished reconcile");

    Ok(match outcome {
        PassOutcome::Absent | PassOutcome::Released | PassOutcome::TornDown => {
            Action::await_change()
        }
        PassOutcome::FinalizerAttached | PassOutcome::Applied => {
            Action::requeue(ctx.resync_interval)
        }
    })
}

pub fn error_policy(
    _obj: Arc<DeserializeGuard<AxonOpsCassandra>>,
    error: &Error,
    ctx: Arc<Ctx>,
) -> Action {
    match error {
        // An invalid object can only be fixed by the user
        Error::InvalidAxonOpsCassandra { .. } => Action::await_change(),
        _ => Action::requeue(ctx.error_requeue_interval),
    }
}

/// Runs one reconciliation of the `AxonOpsCassandra` `namespace/name`.
///
/// The object is read fresh from the store. A missing finalizer is attached and persisted before
/// anything else happens, so no subordinate can exist without it. Deleted objects are handed to
/// [`teardown::teardown`]. Otherwise all tiers are rendered and applied in [`Tier`] order.
///
/// A tier that fails to render is skipped and reported, the remaining tiers are still applied and
/// the pass fails at the end. A failing store call aborts the pass immediately.
pub async fn reconcile_pass(
    store: &impl ResourceStore,
    events: &impl EventSink,
    cluster_info: &KubernetesClusterInfo,
    namespace: &str,
    name: &str,
) -> Result<PassOutcome> {
    let Some(axoncass) = store
        .get::<AxonOpsCassandra>(name, namespace)
        .await
        .with_context(|_| GetAxonOpsCassandraSnafu { namespace, name })?
    else {
        tracing::debug!(namespace, name, "AxonOpsCassandra is gone");
        return Ok(PassOutcome::Absent);
    };

    let deleting = axoncass.metadata.deletion_timestamp.is_some();
    match (deleting, FinalizerState::of(&axoncass)) {
        (true, FinalizerState::Detached) => Ok(PassOutcome::Released),
        (false, FinalizerState::Detached) => {
            store
                .replace(&finalizer::attach(&axoncass))
                .await
                .context(AttachFinalizerSnafu)?;
            tracing::info!(finalizer = finalizer::FINALIZER, "Added finalizer");
            Ok(PassOutcome::FinalizerAttached)
        }
        (true, FinalizerState::Attached) => {
            tracing::info!("AxonOpsCassandra is being deleted, deleting subordinates");
            match teardown::teardown(store, &axoncass).await {
                Ok(()) => {
                    events.publish(&axoncass, AxonOpsEvent::Deleted).await;
                    Ok(PassOutcome::TornDown)
                }
                Err(error) => {
                    let message = snafu::Report::from_error(&error).to_string();
                    events
                        .publish(&axoncass, AxonOpsEvent::TeardownFailed { message })
                        .await;
                    Err(error).context(TeardownSnafu)
                }
            }
        }
        (false, FinalizerState::Attached) => {
            apply_tiers(store, events, cluster_info, &axoncass).await
        }
    }
}

async fn apply_tiers(
    store: &impl ResourceStore,
    events: &impl EventSink,
    cluster_info: &KubernetesClusterInfo,
    axoncass: &AxonOpsCassandra,
) -> Result<PassOutcome> {
    let mut unrendered_tiers = Vec::new();

    for tier in Tier::iter() {
        let config = config::derive(tier, axoncass, cluster_info);
        tracing::debug!(%tier, name = %config.object().name, "Rendering tier");
        let manifests = match render::render(&config) {
            Ok(manifests) => manifests,
            Err(error) => {
                tracing::warn!(
                    %tier,
                    error = &error as &dyn std::error::Error,
                    "Failed to render tier, skipping it"
                );
                let message = error.to_string();
                events
                    .publish(axoncass, AxonOpsEvent::RenderFailed { tier, message })
                    .await;
                unrendered_tiers.push(tier);
                continue;
            }
        };

        for manifest in manifests {
            if let Err(error) = apply_manifest(store, tier, manifest).await {
                let message = snafu::Report::from_error(&error).to_string();
                events
                    .publish(axoncass, AxonOpsEvent::ApplyFailed { tier, message })
                    .await;
                return Err(error);
            }
        }
        tracing::info!(%tier, "Applied tier");
        events.publish(axoncass, AxonOpsEvent::Applied { tier }).await;
    }

    snafu::ensure!(
        unrendered_tiers.is_empty(),
        RenderTiersSnafu {
            tiers: unrendered_tiers
        }
    );
    events.publish(axoncass, AxonOpsEvent::Reconciled).await;
    Ok(PassOutcome::Applied)
}

async fn apply_manifest(store: &impl ResourceStore, tier: Tier, manifest: Manifest) -> Result<()> {
    let kind = manifest.kind();
    let name = manifest.name().to_string();
    let result = match manifest {
        Manifest::StatefulSet(sts) => apply(store, sts).await,
        Manifest::Deployment(deployment) => apply(store, deployment).await,
        Manifest::Service(svc) => apply(store, svc).await,
        Manifest::Ingress(ingress) => apply(store, ingress).await,
    };
    result.with_context(|_| ApplySubordinateSnafu { tier, kind, name })
}

/// Creates `desired` or, if it already exists, overwrites it entirely
async fn apply<K: StoredResource>(
    store: &impl ResourceStore,
    mut desired: K,
) -> Result<(), kube::Error> {
    let name = desired.name_any();
    let namespace = desired.namespace().unwrap_or_default();

    match store.get::<K>(&name, &namespace).await? {
        None => {
            tracing::debug!(kind = %K::kind(&()), name = %name, "Creating subordinate");
            store.create(&desired).await?;
        }
        Some(current) => {
            tracing::debug!(kind = %K::kind(&()), name = %name, "Replacing subordinate");
            desired.carry_over(&current);
            store.replace(&desired).await?;
        }
    }
    Ok(())
}
