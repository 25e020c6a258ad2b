pub mod tier;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stackable_operator::{
    k8s_openapi::{
        api::networking::v1::IngressTLS,
        apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::Condition},
    },
    kube::CustomResource,
    schemars::{self, JsonSchema},
};

pub use tier::Tier;

pub const CQL_PORT_NAME: &str = "cql";
pub const CQL_PORT: u16 = 9042;
pub const JMX_PORT_NAME: &str = "jmx";
pub const JMX_PORT: u16 = 7199;
pub const INTRA_NODE_PORT_NAME: &str = "intra";
pub const INTRA_NODE_PORT: u16 = 7000;
pub const TLS_PORT_NAME: &str = "tls";
pub const TLS_PORT: u16 = 7001;

pub const ELASTIC_REST_PORT_NAME: &str = "rest";
pub const ELASTIC_REST_PORT: u16 = 9200;
pub const ELASTIC_TRANSPORT_PORT_NAME: &str = "inter-node";
pub const ELASTIC_TRANSPORT_PORT: u16 = 9300;

pub const SERVER_API_PORT_NAME: &str = "api";
pub const SERVER_API_PORT: u16 = 8080;
pub const SERVER_AGENT_PORT_NAME: &str = "agent";
pub const SERVER_AGENT_PORT: u16 = 1888;
pub const SERVER_METRICS_PORT_NAME: &str = "metrics";
pub const SERVER_METRICS_PORT: u16 = 6060;

pub const DASHBOARD_HTTP_PORT_NAME: &str = "http";
pub const DASHBOARD_HTTP_PORT: u16 = 3000;

/// A development Apache Cassandra cluster together with the AxonOps stack monitoring it.
///
/// A single `AxonOpsCassandra` object expands into four tiers: Elasticsearch as metrics storage,
/// the AxonOps server, the AxonOps dashboard and the Cassandra nodes themselves. Every field is
/// optional; empty values fall back to the defaults of the respective tier.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "axonops.com",
    version = "v1beta1",
    kind = "AxonOpsCassandra",
    plural = "axonopscassandras",
    shortname = "axoncass",
    status = "AxonOpsCassandraStatus",
    namespaced,
    crates(
        kube_core = "stackable_operator::kube::core",
        k8s_openapi = "stackable_operator::k8s_openapi",
        schemars = "stackable_operator::schemars"
    )
)]
#[serde(rename_all = "camelCase")]
pub struct AxonOpsCassandraSpec {
    /// The Apache Cassandra cluster. Without persistent storage the nodes use ephemeral storage
    /// and decommission themselves when stopped.
    #[serde(default)]
    pub cassandra: CassandraSpec,

    /// The AxonOps components: server, dashboard and the Elasticsearch metrics store.
    #[serde(default)]
    pub axonops: AxonOpsSpec,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxonOpsSpec {
    #[serde(default)]
    pub dashboard: DashboardSpec,

    #[serde(default)]
    pub server: ServerSpec,

    #[serde(default)]
    pub elasticsearch: ElasticsearchSpec,
}

/// Container image reference, `repository` and `tag` are defaulted independently.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerImage {
    #[serde(default)]
    pub repository: String,

    #[serde(default)]
    pub tag: String,
}

/// An extra environment variable added to the main container, after the operator generated ones.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVariable {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub value: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeSpec {
    /// Size of the volume claim, e.g. `10Gi`. Leave empty to run on ephemeral storage.
    #[serde(default)]
    pub size: String,

    /// Optional StorageClass of the volume claim.
    #[serde(default)]
    pub storage_class: String,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesSpec {
    #[serde(default)]
    pub requests: ResourceQuantities,

    #[serde(default)]
    pub limits: ResourceQuantities,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuantities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Quantity>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CassandraSpec {
    #[serde(default)]
    pub image: ContainerImage,

    /// Number of Cassandra nodes, defaults to 1.
    #[serde(default)]
    pub replicas: i32,

    /// Defaults to the name of the `AxonOpsCassandra` object.
    #[serde(default)]
    pub cluster_name: String,

    /// Datacenter the nodes announce, defaults to `dc1`.
    #[serde(default)]
    pub dc: String,

    #[serde(default)]
    pub persistent_volume: PersistentVolumeSpec,

    #[serde(default)]
    pub java_opts: String,

    /// Value of `MAX_HEAP_SIZE`, defaults to `512M`.
    #[serde(default)]
    pub heap_size: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVariable>,

    #[serde(default)]
    pub resources: ResourcesSpec,

    #[serde(default)]
    pub pull_policy: String,

    /// Also create the headless `ca-<name>-headless` Service publishing not-ready addresses.
    #[serde(default)]
    pub headless_service: bool,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSpec {
    #[serde(default)]
    pub image: ContainerImage,

    /// Number of dashboard replicas, defaults to 1.
    #[serde(default)]
    pub replicas: i32,

    #[serde(default)]
    pub ingress: IngressSpec,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVariable>,

    #[serde(default)]
    pub resources: ResourcesSpec,

    #[serde(default)]
    pub pull_policy: String,
}

/// Exposes the dashboard through an Ingress.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Only `networking.k8s.io/v1` is supported, which is also the default.
    #[serde(default)]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub ingress_class_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    /// TLS entries. When empty, one entry covering all hosts with the secret `<name>-tls` is used.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<IngressTLS>,

    #[serde(default)]
    pub path: String,

    /// One of `Exact`, `Prefix` or `ImplementationSpecific`, defaults to `Prefix`.
    #[serde(default)]
    pub path_type: String,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    #[serde(default)]
    pub image: ContainerImage,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVariable>,

    #[serde(default)]
    pub resources: ResourcesSpec,

    #[serde(default)]
    pub pull_policy: String,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchSpec {
    #[serde(default)]
    pub image: ContainerImage,

    #[serde(default)]
    pub persistent_volume: PersistentVolumeSpec,

    #[serde(default)]
    pub java_opts: String,

    /// Defaults to the name of the `AxonOpsCassandra` object.
    #[serde(default)]
    pub cluster_name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVariable>,

    #[serde(default)]
    pub resources: ResourcesSpec,

    #[serde(default)]
    pub pull_policy: String,
}

// Not written by the operator yet, kept in the schema for compatibility with existing objects.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxonOpsCassandraStatus {
    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}
