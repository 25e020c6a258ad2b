//! Access to the Kubernetes API as seen by the reconciler.
//!
//! [`ResourceStore`] is the only way the reconciler and the teardown reach the cluster, which
//! keeps both testable against an in-memory store. The operator uses the stackable [`Client`].
use std::{fmt::Debug, future::Future};

use serde::{Serialize, de::DeserializeOwned};
use stackable_operator::{
    client::Client,
    k8s_openapi::{
        NamespaceResourceScope,
        api::{
            apps::v1::{Deployment, StatefulSet},
            core::v1::Service,
            networking::v1::Ingress,
        },
    },
    kube::{
        self, Resource, ResourceExt,
        api::{DeleteParams, PostParams},
    },
};
use strum::Display;

use crate::{OPERATOR_NAME, crd::AxonOpsCassandra};

/// A namespaced object kind that can be read and written through a [`ResourceStore`]
pub trait StoredResource:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    /// Prepares `self` to fully replace `current`.
    ///
    /// The `resourceVersion` is taken over so that a concurrent modification fails the replace
    /// with a conflict instead of being silently lost.
    fn carry_over(&mut self, current: &Self) {
        self.meta_mut().resource_version = current.meta().resource_version.clone();
    }
}

impl StoredResource for AxonOpsCassandra {}
impl StoredResource for StatefulSet {}
impl StoredResource for Deployment {}
impl StoredResource for Ingress {}

impl StoredResource for Service {
    // The cluster IPs are immutable once allocated.
    fn carry_over(&mut self, current: &Self) {
        self.metadata.resource_version = current.metadata.resource_version.clone();
        if let (Some(desired), Some(current)) = (self.spec.as_mut(), current.spec.as_ref()) {
            if desired.cluster_ip.is_none() {
                desired.cluster_ip = current.cluster_ip.clone();
                desired.cluster_ips = current.cluster_ips.clone();
            }
        }
    }
}

/// The subordinate object kinds, used where kinds have to be handled as values
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum SubordinateKind {
    StatefulSet,
    Deployment,
    Service,
    Ingress,
}

pub trait ResourceStore: Send + Sync {
    /// Returns `None` if the object does not exist.
    fn get<K: StoredResource>(
        &self,
        name: &str,
        namespace: &str,
    ) -> impl Future<Output = Result<Option<K>, kube::Error>> + Send;

    fn create<K: StoredResource>(
        &self,
        obj: &K,
    ) -> impl Future<Output = Result<K, kube::Error>> + Send;

    /// Overwrites the whole object.
    fn replace<K: StoredResource>(
        &self,
        obj: &K,
    ) -> impl Future<Output = Result<K, kube::Error>> + Send;

    /// Succeeds if the object is already gone.
    fn delete<K: StoredResource>(
        &self,
        name: &str,
        namespace: &str,
    ) -> impl Future<Output = Result<(), kube::Error>> + Send;
}

pub fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 404)
}

fn post_params() -> PostParams {
    PostParams {
        dry_run: false,
        field_manager: Some(OPERATOR_NAME.to_string()),
    }
}

impl ResourceStore for Client {
    async fn get<K: StoredResource>(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<K>, kube::Error> {
        self.get_namespaced_api::<K>(namespace).get_opt(name).await
    }

    async fn create<K: StoredResource>(&self, obj: &K) -> Result<K, kube::Error> {
        let namespace = obj.namespace().unwrap_or_default();
        self.get_namespaced_api::<K>(&namespace)
            .create(&post_params(), obj)
            .await
    }

    async fn replace<K: StoredResource>(&self, obj: &K) -> Result<K, kube::Error> {
        let namespace = obj.namespace().unwrap_or_default();
        self.get_namespaced_api::<K>(&namespace)
            .replace(&obj.name_any(), &post_params(), obj)
            .await
    }

    async fn delete<K: StoredResource>(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<(), kube::Error> {
        match self
            .get_namespaced_api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(error) if is_not_found(&error) => Ok(()),
            Err(error) => Err(error),
        }
    }
}
