//! Projects the user-authored [`AxonOpsCassandra`] onto one fully defaulted configuration per
//! [`Tier`].
//!
//! The configurations are rebuilt on every reconciliation and handed to [`crate::render`], they
//! are never persisted. Every field is defaulted independently: an empty value (empty string, zero
//! replicas, missing quantity) is replaced by the constant of the respective tier.
pub mod resources;

use std::collections::BTreeMap;

use stackable_operator::{
    k8s_openapi::{
        api::networking::v1::IngressTLS,
        apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::OwnerReference},
    },
    kube::{Resource, ResourceExt},
    utils::cluster_info::KubernetesClusterInfo,
};

use crate::{
    config::resources::{ContainerResources, ResourceDefaults},
    crd::{
        AxonOpsCassandra, ContainerImage, EnvVariable, IngressSpec, PersistentVolumeSpec, Tier,
    },
};

pub const DEFAULT_PULL_POLICY: &str = "IfNotPresent";
pub const DEFAULT_JAVA_OPTS: &str = "-Xms512m -Xmx512m";

pub const DEFAULT_CASSANDRA_IMAGE: &str = "ghcr.io/axonops/cassandra";
pub const DEFAULT_CASSANDRA_TAG: &str = "5.0.2";
pub const DEFAULT_CASSANDRA_DC: &str = "dc1";
pub const DEFAULT_CASSANDRA_HEAP_SIZE: &str = "512M";
const CASSANDRA_RESOURCES: ResourceDefaults = ResourceDefaults {
    cpu: ("500m", "1000m"),
    memory: ("1Gi", "2Gi"),
};

pub const DEFAULT_ELASTICSEARCH_IMAGE: &str = "docker.elastic.co/elasticsearch/elasticsearch";
pub const DEFAULT_ELASTICSEARCH_TAG: &str = "7.17.0";
const ELASTICSEARCH_RESOURCES: ResourceDefaults = ResourceDefaults {
    cpu: ("500m", "1000m"),
    memory: ("1Gi", "2Gi"),
};

pub const DEFAULT_SERVER_IMAGE: &str =
    "registry.axonops.com/axonops-public/axonops-docker/axon-server";
pub const DEFAULT_SERVER_TAG: &str = "latest";
const SERVER_RESOURCES: ResourceDefaults = ResourceDefaults {
    cpu: ("250m", "1000m"),
    memory: ("256Mi", "512Mi"),
};

pub const DEFAULT_DASHBOARD_IMAGE: &str =
    "registry.axonops.com/axonops-public/axonops-docker/axon-dash";
pub const DEFAULT_DASHBOARD_TAG: &str = "latest";
const DASHBOARD_RESOURCES: ResourceDefaults = ResourceDefaults {
    cpu: ("500m", "1000m"),
    memory: ("256Mi", "512Mi"),
};

pub const DEFAULT_INGRESS_API_VERSION: &str = "networking.k8s.io/v1";
pub const DEFAULT_INGRESS_PATH: &str = "/";
pub const DEFAULT_INGRESS_PATH_TYPE: &str = "Prefix";

const DEFAULT_REPLICAS: i32 = 1;

/// Identity and metadata shared by all documents of one tier
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectConfig {
    pub tier: Tier,
    /// `<prefix>-<composite name>`
    pub name: String,
    pub namespace: String,
    pub composite_name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// Controller reference to the composite object, absent if it has not been persisted yet
    pub owner: Option<OwnerReference>,
}

impl ObjectConfig {
    /// Name of the same-namespace object of another tier, e.g. the server a database node reports to
    pub fn companion_name(&self, tier: Tier) -> String {
        tier.object_name(&self.composite_name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContainerConfig {
    /// `repository:tag`
    pub image: String,
    pub pull_policy: String,
    /// Appended after the generated variables, in user order
    pub env: Vec<EnvVariable>,
    pub resources: ContainerResources,
}

/// Persistent volume claim parameters. Only present if the user asked for a size.
#[derive(Clone, Debug, PartialEq)]
pub struct StorageConfig {
    pub size: Quantity,
    pub storage_class: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DatabaseConfig {
    pub object: ObjectConfig,
    pub container: ContainerConfig,
    pub replicas: i32,
    pub cluster_name: String,
    pub dc: String,
    pub java_opts: String,
    pub heap_size: String,
    pub storage: Option<StorageConfig>,
    pub headless_service: bool,
    /// Suffix of the pod FQDNs, e.g. `cluster.local`
    pub cluster_domain: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchIndexConfig {
    pub object: ObjectConfig,
    pub container: ContainerConfig,
    pub replicas: i32,
    pub cluster_name: String,
    pub java_opts: String,
    pub storage: Option<StorageConfig>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub object: ObjectConfig,
    pub container: ContainerConfig,
    pub replicas: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DashboardConfig {
    pub object: ObjectConfig,
    pub container: ContainerConfig,
    pub replicas: i32,
    /// Only present if the ingress is enabled
    pub ingress: Option<IngressConfig>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IngressConfig {
    pub api_version: String,
    pub class_name: Option<String>,
    pub hosts: Vec<String>,
    pub tls: Vec<IngressTLS>,
    pub path: String,
    pub path_type: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DerivedConfig {
    SearchIndex(SearchIndexConfig),
    Dashboard(DashboardConfig),
    Server(ServerConfig),
    Database(DatabaseConfig),
}

impl DerivedConfig {
    pub fn object(&self) -> &ObjectConfig {
        match self {
            DerivedConfig::SearchIndex(config) => &config.object,
            DerivedConfig::Dashboard(config) => &config.object,
            DerivedConfig::Server(config) => &config.object,
            DerivedConfig::Database(config) => &config.object,
        }
    }
}

/// Resolves the configuration of `tier` from the current state of the composite object.
pub fn derive(
    tier: Tier,
    axoncass: &AxonOpsCassandra,
    cluster_info: &KubernetesClusterInfo,
) -> DerivedConfig {
    match tier {
        Tier::SearchIndex => DerivedConfig::SearchIndex(derive_search_index(axoncass)),
        Tier::Dashboard => DerivedConfig::Dashboard(derive_dashboard(axoncass)),
        Tier::Server => DerivedConfig::Server(derive_server(axoncass)),
        Tier::Database => DerivedConfig::Database(derive_database(axoncass, cluster_info)),
    }
}

fn derive_database(
    axoncass: &AxonOpsCassandra,
    cluster_info: &KubernetesClusterInfo,
) -> DatabaseConfig {
    let spec = &axoncass.spec.cassandra;
    let tier = Tier::Database;
    DatabaseConfig {
        object: object_config(tier, axoncass, &spec.labels, &spec.annotations),
        container: ContainerConfig {
            image: image_reference(&spec.image, DEFAULT_CASSANDRA_IMAGE, DEFAULT_CASSANDRA_TAG),
            pull_policy: value_or_default(&spec.pull_policy, DEFAULT_PULL_POLICY),
            env: spec.env.clone(),
            resources: ContainerResources::resolve(tier, &spec.resources, &CASSANDRA_RESOURCES),
        },
        replicas: replicas_or_default(spec.replicas),
        cluster_name: value_or_default(&spec.cluster_name, &axoncass.name_any()),
        dc: value_or_default(&spec.dc, DEFAULT_CASSANDRA_DC),
        java_opts: value_or_default(&spec.java_opts, DEFAULT_JAVA_OPTS),
        heap_size: value_or_default(&spec.heap_size, DEFAULT_CASSANDRA_HEAP_SIZE),
        storage: storage_config(&spec.persistent_volume),
        headless_service: spec.headless_service,
        cluster_domain: cluster_info.cluster_domain.to_string(),
    }
}

fn derive_search_index(axoncass: &AxonOpsCassandra) -> SearchIndexConfig {
    let spec = &axoncass.spec.axonops.elasticsearch;
    let tier = Tier::SearchIndex;
    SearchIndexConfig {
        object: object_config(tier, axoncass, &spec.labels, &spec.annotations),
        container: ContainerConfig {
            image: image_reference(
                &spec.image,
                DEFAULT_ELASTICSEARCH_IMAGE,
                DEFAULT_ELASTICSEARCH_TAG,
            ),
            pull_policy: value_or_default(&spec.pull_policy, DEFAULT_PULL_POLICY),
            env: spec.env.clone(),
            resources: ContainerResources::resolve(
                tier,
                &spec.resources,
                &ELASTICSEARCH_RESOURCES,
            ),
        },
        // Elasticsearch runs as `discovery.type=single-node`
        replicas: DEFAULT_REPLICAS,
        cluster_name: value_or_default(&spec.cluster_name, &axoncass.name_any()),
        java_opts: value_or_default(&spec.java_opts, DEFAULT_JAVA_OPTS),
        storage: storage_config(&spec.persistent_volume),
    }
}

fn derive_server(axoncass: &AxonOpsCassandra) -> ServerConfig {
    let spec = &axoncass.spec.axonops.server;
    let tier = Tier::Server;
    ServerConfig {
        object: object_config(tier, axoncass, &spec.labels, &spec.annotations),
        container: ContainerConfig {
            image: image_reference(&spec.image, DEFAULT_SERVER_IMAGE, DEFAULT_SERVER_TAG),
            pull_policy: value_or_default(&spec.pull_policy, DEFAULT_PULL_POLICY),
            env: spec.env.clone(),
            resources: ContainerResources::resolve(tier, &spec.resources, &SERVER_RESOURCES),
        },
        replicas: DEFAULT_REPLICAS,
    }
}

fn derive_dashboard(axoncass: &AxonOpsCassandra) -> DashboardConfig {
    let spec = &axoncass.spec.axonops.dashboard;
    let tier = Tier::Dashboard;
    DashboardConfig {
        object: object_config(tier, axoncass, &spec.labels, &spec.annotations),
        container: ContainerConfig {
            image: image_reference(&spec.image, DEFAULT_DASHBOARD_IMAGE, DEFAULT_DASHBOARD_TAG),
            pull_policy: value_or_default(&spec.pull_policy, DEFAULT_PULL_POLICY),
            env: spec.env.clone(),
            resources: ContainerResources::resolve(tier, &spec.resources, &DASHBOARD_RESOURCES),
        },
        replicas: replicas_or_default(spec.replicas),
        ingress: spec.ingress.enabled.then(|| ingress_config(&spec.ingress)),
    }
}

fn ingress_config(spec: &IngressSpec) -> IngressConfig {
    IngressConfig {
        api_version: value_or_default(&spec.api_version, DEFAULT_INGRESS_API_VERSION),
        class_name: non_empty(&spec.ingress_class_name),
        hosts: spec.hosts.clone(),
        tls: spec.tls.clone(),
        path: value_or_default(&spec.path, DEFAULT_INGRESS_PATH),
        path_type: value_or_default(&spec.path_type, DEFAULT_INGRESS_PATH_TYPE),
        labels: spec.labels.clone(),
        annotations: spec.annotations.clone(),
    }
}

fn object_config(
    tier: Tier,
    axoncass: &AxonOpsCassandra,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> ObjectConfig {
    let composite_name = axoncass.name_any();
    ObjectConfig {
        tier,
        name: tier.object_name(&composite_name),
        namespace: axoncass.namespace().unwrap_or_default(),
        composite_name,
        labels: labels.clone(),
        annotations: annotations.clone(),
        owner: axoncass.controller_owner_ref(&()),
    }
}

/// An empty size means ephemeral storage, there is no default size.
fn storage_config(spec: &PersistentVolumeSpec) -> Option<StorageConfig> {
    non_empty(&spec.size).map(|size| StorageConfig {
        size: Quantity(size),
        storage_class: non_empty(&spec.storage_class),
    })
}

fn image_reference(image: &ContainerImage, default_repository: &str, default_tag: &str) -> String {
    format!(
        "{repository}:{tag}",
        repository = value_or_default(&image.repository, default_repository),
        tag = value_or_default(&image.tag, default_tag),
    )
}

fn value_or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn replicas_or_default(replicas: i32) -> i32 {
    if replicas == 0 {
        DEFAULT_REPLICAS
    } else {
        replicas
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
