//! In-memory stand-ins for the Kubernetes API and the event recorder.
use std::{collections::BTreeMap, sync::Mutex};

use serde::Serialize;
use serde_json::{Value, json};
use stackable_operator::{
    commons::networking::DomainName,
    kube::{self, Resource, ResourceExt, error::ErrorResponse},
    utils::cluster_info::KubernetesClusterInfo,
};

use crate::{
    crd::AxonOpsCassandra,
    event::{AxonOpsEvent, EventSink},
    store::{ResourceStore, StoredResource},
};

const DELETION_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verb {
    Get,
    Create,
    Replace,
    Delete,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreCall {
    pub verb: Verb,
    pub kind: String,
    pub name: String,
}

impl StoreCall {
    pub fn new(verb: Verb, kind: &str, name: &str) -> Self {
        Self {
            verb,
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

type ObjectKey = (String, String, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, Value>,
    resource_version: u64,
    calls: Vec<StoreCall>,
    failures: Vec<(StoreCall, u16)>,
}

impl State {
    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn record(&mut self, call: StoreCall) -> Result<(), kube::Error> {
        let failure = self
            .failures
            .iter()
            .find(|(failing, _)| *failing == call)
            .map(|(_, code)| *code);
        self.calls.push(call);
        match failure {
            Some(code) => Err(api_error(code, "InternalError")),
            None => Ok(()),
        }
    }
}

/// Mimics the API server semantics the reconciler relies on: `resourceVersion` conflicts,
/// not-found errors and deletion gated on finalizers.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

pub fn cluster_info() -> KubernetesClusterInfo {
    KubernetesClusterInfo {
        cluster_domain: DomainName::try_from("cluster.local").unwrap(),
    }
}

pub fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} ({code})"),
        reason: reason.to_string(),
        code,
    })
}

fn kind_of<K: Resource<DynamicType = ()>>() -> String {
    K::kind(&()).to_string()
}

fn key(kind: &str, namespace: &str, name: &str) -> ObjectKey {
    (kind.to_string(), namespace.to_string(), name.to_string())
}

fn finalizers(value: &Value) -> usize {
    value["metadata"]["finalizers"]
        .as_array()
        .map_or(0, Vec::len)
}

impl InMemoryStore {
    /// Stores `obj` as is, bypassing call recording and fault injection
    pub fn insert<K: Resource<DynamicType = ()> + Serialize>(&self, obj: &K) {
        let mut state = self.state.lock().unwrap();
        let mut value = serde_json::to_value(obj).unwrap();
        value["metadata"]["resourceVersion"] = json!(state.next_resource_version());
        let namespace = obj.meta().namespace.clone().unwrap_or_default();
        let name = obj.meta().name.clone().unwrap_or_default();
        state
            .objects
            .insert(key(&kind_of::<K>(), &namespace, &name), value);
    }

    pub fn object<K: StoredResource>(&self, name: &str, namespace: &str) -> Option<K> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&key(&kind_of::<K>(), namespace, name))
            .map(|value| serde_json::from_value(value.clone()).unwrap())
    }

    /// `Kind/name` of every stored object except the `AxonOpsCassandra` objects
    pub fn subordinates(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .keys()
            .filter(|(kind, _, _)| *kind != kind_of::<AxonOpsCassandra>())
            .map(|(kind, _, name)| format!("{kind}/{name}"))
            .collect()
    }

    /// Requests the deletion of an `AxonOpsCassandra` the way `kubectl delete` does
    pub fn request_deletion(&self, name: &str, namespace: &str) {
        let mut state = self.state.lock().unwrap();
        let key = key(&kind_of::<AxonOpsCassandra>(), namespace, name);
        let value = state.objects.get_mut(&key).unwrap();
        if finalizers(value) == 0 {
            state.objects.remove(&key);
        } else {
            value["metadata"]["deletionTimestamp"] = json!(DELETION_TIMESTAMP);
        }
    }

    /// Makes every matching call fail with `code` until [`Self::clear_failures`]
    pub fn fail(&self, verb: Verb, kind: &str, name: &str, code: u16) {
        let mut state = self.state.lock().unwrap();
        state.failures.push((StoreCall::new(verb, kind, name), code));
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn count(&self, verb: Verb) -> usize {
        self.calls().iter().filter(|call| call.verb == verb).count()
    }
}

impl ResourceStore for InMemoryStore {
    async fn get<K: StoredResource>(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<K>, kube::Error> {
        let kind = kind_of::<K>();
        let mut state = self.state.lock().unwrap();
        state.record(StoreCall::new(Verb::Get, &kind, name))?;
        state
            .objects
            .get(&key(&kind, namespace, name))
            .map(|value| serde_json::from_value(value.clone()).map_err(kube::Error::SerdeError))
            .transpose()
    }

    async fn create<K: StoredResource>(&self, obj: &K) -> Result<K, kube::Error> {
        let kind = kind_of::<K>();
        let name = obj.name_any();
        let mut state = self.state.lock().unwrap();
        state.record(StoreCall::new(Verb::Create, &kind, &name))?;

        let key = key(&kind, &obj.namespace().unwrap_or_default(), &name);
        if state.objects.contains_key(&key) {
            return Err(api_error(409, "AlreadyExists"));
        }
        let mut value = serde_json::to_value(obj).map_err(kube::Error::SerdeError)?;
        value["metadata"]["resourceVersion"] = json!(state.next_resource_version());
        value["metadata"]["uid"] = json!(format!("uid-{kind}-{name}"));
        state.objects.insert(key, value.clone());
        serde_json::from_value(value).map_err(kube::Error::SerdeError)
    }

    async fn replace<K: StoredResource>(&self, obj: &K) -> Result<K, kube::Error> {
        let kind = kind_of::<K>();
        let name = obj.name_any();
        let mut state = self.state.lock().unwrap();
        state.record(StoreCall::new(Verb::Replace, &kind, &name))?;

        let key = key(&kind, &obj.namespace().unwrap_or_default(), &name);
        let Some(current) = state.objects.get(&key).cloned() else {
            return Err(api_error(404, "NotFound"));
        };
        if let Some(resource_version) = &obj.meta().resource_version {
            if current["metadata"]["resourceVersion"] != json!(resource_version) {
                return Err(api_error(409, "Conflict"));
            }
        }

        let mut value = serde_json::to_value(obj).map_err(kube::Error::SerdeError)?;
        for server_field in ["uid", "deletionTimestamp"] {
            value["metadata"][server_field] = current["metadata"][server_field].clone();
        }
        value["metadata"]["resourceVersion"] = json!(state.next_resource_version());
        if !value["metadata"]["deletionTimestamp"].is_null() && finalizers(&value) == 0 {
            state.objects.remove(&key);
        } else {
            state.objects.insert(key, value.clone());
        }
        serde_json::from_value(value).map_err(kube::Error::SerdeError)
    }

    async fn delete<K: StoredResource>(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<(), kube::Error> {
        let kind = kind_of::<K>();
        let mut state = self.state.lock().unwrap();
        state.record(StoreCall::new(Verb::Delete, &kind, name))?;
        state.objects.remove(&key(&kind, namespace, name));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<AxonOpsEvent>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<AxonOpsEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingEvents {
    async fn publish(&self, _axoncass: &AxonOpsCassandra, event: AxonOpsEvent) {
        self.events.lock().unwrap().push(event);
    }
}
