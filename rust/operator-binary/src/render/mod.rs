//! Turns a [`DerivedConfig`] into the Kubernetes documents of its tier.
//!
//! Rendering is pure: the same configuration always yields the same documents, which is what
//! keeps repeated reconciliations from producing spurious changes.
mod dashboard;
mod database;
mod search_index;
mod server;

use std::collections::BTreeMap;

use snafu::{ResultExt, Snafu};
use stackable_operator::{
    builder::meta::ObjectMetaBuilder,
    k8s_openapi::{
        api::{
            apps::v1::{Deployment, StatefulSet},
            core::v1::{
                ContainerPort, EnvVar, EnvVarSource, ObjectFieldSelector, PersistentVolumeClaim,
                PersistentVolumeClaimSpec, ResourceRequirements, Service, ServicePort,
                VolumeResourceRequirements,
            },
            networking::v1::Ingress,
        },
        apimachinery::pkg::{
            apis::meta::v1::{LabelSelector, ObjectMeta},
            util::intstr::IntOrString,
        },
    },
    kvp::{Annotation, AnnotationError, Label, LabelError},
};

use crate::{
    config::{
        ContainerConfig, DerivedConfig, ObjectConfig, StorageConfig, resources::ContainerResources,
    },
    crd::EnvVariable,
};

pub const DATA_VOLUME_NAME: &str = "data";

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("invalid label {key:?}={value:?} on {object}"))]
    InvalidLabel {
        source: LabelError,
        object: String,
        key: String,
        value: String,
    },

    #[snafu(display("invalid annotation {key:?} on {object}"))]
    InvalidAnnotation {
        source: AnnotationError,
        object: String,
        key: String,
    },

    #[snafu(display(
        "unsupported Ingress apiVersion {api_version:?}, only \"networking.k8s.io/v1\" is supported"
    ))]
    UnsupportedIngressApiVersion { api_version: String },

    #[snafu(display(
        "unsupported Ingress pathType {path_type:?}, expected one of Exact, Prefix or ImplementationSpecific"
    ))]
    UnsupportedIngressPathType { path_type: String },

    #[snafu(display("the Ingress {name} is enabled but has no hosts"))]
    IngressWithoutHosts { name: String },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// A rendered subordinate document, ready to be submitted to the store
#[derive(Clone, Debug, PartialEq)]
pub enum Manifest {
    StatefulSet(StatefulSet),
    Deployment(Deployment),
    Service(Service),
    Ingress(Ingress),
}

impl Manifest {
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Manifest::StatefulSet(sts) => &sts.metadata,
            Manifest::Deployment(deployment) => &deployment.metadata,
            Manifest::Service(svc) => &svc.metadata,
            Manifest::Ingress(ingress) => &ingress.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Manifest::StatefulSet(_) => "StatefulSet",
            Manifest::Deployment(_) => "Deployment",
            Manifest::Service(_) => "Service",
            Manifest::Ingress(_) => "Ingress",
        }
    }
}

/// Renders every document of a tier, in the order they have to be applied.
///
/// The workload comes first and its Service second. The dashboard Ingress, if enabled, follows
/// its Service.
pub fn render(config: &DerivedConfig) -> Result<Vec<Manifest>> {
    Ok(match config {
        DerivedConfig::SearchIndex(config) => vec![
            Manifest::StatefulSet(search_index::build_statefulset(config)?),
            Manifest::Service(search_index::build_service(config)?),
        ],
        DerivedConfig::Dashboard(config) => {
            let mut manifests = vec![
                Manifest::Deployment(dashboard::build_deployment(config)?),
                Manifest::Service(dashboard::build_service(config)?),
            ];
            if let Some(ingress) = &config.ingress {
                manifests.push(Manifest::Ingress(dashboard::build_ingress(
                    &config.object,
                    ingress,
                )?));
            }
            manifests
        }
        DerivedConfig::Server(config) => vec![
            Manifest::StatefulSet(server::build_statefulset(config)?),
            Manifest::Service(server::build_service(config)?),
        ],
        DerivedConfig::Database(config) => {
            let mut manifests = vec![
                Manifest::StatefulSet(database::build_statefulset(config)?),
                Manifest::Service(database::build_service(config)?),
            ];
            if config.headless_service {
                manifests.push(Manifest::Service(database::build_headless_service(config)?));
            }
            manifests
        }
    })
}

/// Labels selecting the pods of a tier workload
fn selector_labels(object: &ObjectConfig) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), object.name.clone())])
}

fn label_selector(object: &ObjectConfig) -> LabelSelector {
    LabelSelector {
        match_labels: Some(selector_labels(object)),
        ..LabelSelector::default()
    }
}

/// Metadata of a top level document of the tier, named `name`.
///
/// User labels named `app` or `component` are dropped, the workload selectors depend on them.
fn object_meta(
    object: &ObjectConfig,
    name: &str,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> Result<ObjectMeta> {
    let mut builder = ObjectMetaBuilder::new();
    builder
        .name(name)
        .namespace(&object.namespace)
        .ownerreference_opt(object.owner.clone());

    let generated = [
        ("app", object.name.as_str()),
        ("component", object.tier.component()),
    ];
    let user = labels
        .iter()
        .filter(|(key, _)| {
            !generated
                .iter()
                .any(|(generated_key, _)| *generated_key == key.as_str())
        })
        .map(|(key, value)| (key.as_str(), value.as_str()));
    for (key, value) in user.chain(generated.iter().copied()) {
        builder.with_label(Label::try_from((key, value)).with_context(|_| InvalidLabelSnafu {
            object: name,
            key,
            value,
        })?);
    }
    for (key, value) in annotations {
        builder.with_annotation(
            Annotation::try_from((key.as_str(), value.as_str()))
                .with_context(|_| InvalidAnnotationSnafu { object: name, key })?,
        );
    }

    Ok(builder.build())
}

fn tier_meta(object: &ObjectConfig) -> Result<ObjectMeta> {
    object_meta(object, &object.name, &object.labels, &object.annotations)
}

fn pod_template_meta(object: &ObjectConfig) -> ObjectMeta {
    ObjectMeta {
        labels: Some(selector_labels(object)),
        ..ObjectMeta::default()
    }
}

fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..EnvVar::default()
    }
}

/// Environment variable resolved through the downward API
fn field_ref_env_var(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                ..ObjectFieldSelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}

fn node_name_env_var() -> EnvVar {
    field_ref_env_var("node.name", "metadata.name")
}

/// Appends the user supplied variables to the generated ones. Duplicates are kept, the last one
/// wins inside the container.
fn with_user_env(mut generated: Vec<EnvVar>, user: &[EnvVariable]) -> Vec<EnvVar> {
    generated.extend(user.iter().map(|env| env_var(&env.name, &env.value)));
    generated
}

fn resource_requirements(resources: &ContainerResources) -> ResourceRequirements {
    ResourceRequirements {
        limits: Some(BTreeMap::from([
            ("cpu".to_string(), resources.cpu_limit.clone()),
            ("memory".to_string(), resources.memory_limit.clone()),
        ])),
        requests: Some(BTreeMap::from([
            ("cpu".to_string(), resources.cpu_request.clone()),
            ("memory".to_string(), resources.memory_request.clone()),
        ])),
        ..ResourceRequirements::default()
    }
}

fn pull_policy(container: &ContainerConfig) -> Option<String> {
    Some(container.pull_policy.clone())
}

fn container_port(name: &str, port: u16) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port.into(),
        ..ContainerPort::default()
    }
}

/// TCP service port forwarding to the container port of the same name
fn service_port(name: &str, port: u16) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port: port.into(),
        target_port: Some(IntOrString::String(name.to_string())),
        protocol: Some("TCP".to_string()),
        ..ServicePort::default()
    }
}

fn volume_claim_template(storage: &StorageConfig) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(DATA_VOLUME_NAME.to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: storage.storage_class.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    storage.size.clone(),
                )])),
                ..VolumeResourceRequirements::default()
            }),
            ..PersistentVolumeClaimSpec::default()
        }),
        ..PersistentVolumeClaim::default()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::{
        config,
        crd::{AxonOpsCassandra, Tier},
        test_utils::cluster_info,
    };

    fn axoncass(input: &str) -> AxonOpsCassandra {
        serde_yaml::from_str(input).unwrap()
    }

    fn render_tier(tier: Tier, axoncass: &AxonOpsCassandra) -> Result<Vec<Manifest>> {
        render(&config::derive(tier, axoncass, &cluster_info()))
    }

    #[test]
    fn test_documents_per_tier() {
        let axoncass = axoncass(indoc! {"
            apiVersion: axonops.com/v1beta1
            kind: AxonOpsCassandra
            metadata:
              name: demo
              namespace: ns
            spec:
              cassandra:
                headlessService: true
              axonops:
                dashboard:
                  ingress:
                    enabled: true
                    hosts:
                      - axonops.example.com
        "});

        let documents = |tier| {
            render_tier(tier, &axoncass)
                .unwrap()
                .iter()
                .map(|manifest| format!("{}/{}", manifest.kind(), manifest.name()))
                .collect::<Vec<_>>()
        };

        assert_eq!(
            documents(Tier::SearchIndex),
            vec!["StatefulSet/es-demo", "Service/es-demo"]
        );
        assert_eq!(
            documents(Tier::Dashboard),
            vec!["Deployment/ds-demo", "Service/ds-demo", "Ingress/ds-demo"]
        );
        assert_eq!(
            documents(Tier::Server),
            vec!["StatefulSet/as-demo", "Service/as-demo"]
        );
        assert_eq!(
            documents(Tier::Database),
            vec![
                "StatefulSet/ca-demo",
                "Service/ca-demo",
                "Service/ca-demo-headless"
            ]
        );
    }

    #[test]
    fn test_common_metadata() {
        let axoncass = axoncass(indoc! {"
            apiVersion: axonops.com/v1beta1
            kind: AxonOpsCassandra
            metadata:
              name: demo
              namespace: ns
              uid: c0ffee
            spec:
              axonops:
                server:
                  labels:
                    team: data
                    app: overridden
                  annotations:
                    example.com/owner: data-team
        "});

        for manifest in render_tier(Tier::Server, &axoncass).unwrap() {
            let metadata = manifest.metadata();
            assert_eq!(metadata.namespace.as_deref(), Some("ns"));
            assert_eq!(
                metadata.labels,
                Some(BTreeMap::from([
                    ("app".to_string(), "as-demo".to_string()),
                    ("component".to_string(), "axon-server".to_string()),
                    ("team".to_string(), "data".to_string()),
                ]))
            );
            assert_eq!(
                metadata.annotations,
                Some(BTreeMap::from([(
                    "example.com/owner".to_string(),
                    "data-team".to_string()
                )]))
            );
            let owners = metadata.owner_references.as_ref().unwrap();
            assert_eq!(owners.len(), 1);
            assert_eq!(owners[0].uid, "c0ffee");
        }
    }

    #[test]
    fn test_invalid_label_is_render_error() {
        let axoncass = axoncass(indoc! {"
            apiVersion: axonops.com/v1beta1
            kind: AxonOpsCassandra
            metadata:
              name: demo
              namespace: ns
            spec:
              axonops:
                elasticsearch:
                  labels:
                    team: not a valid value
        "});

        let error = render_tier(Tier::SearchIndex, &axoncass).unwrap_err();
        assert!(matches!(error, Error::InvalidLabel { ref key, .. } if key == "team"));

        // Other tiers are unaffected
        assert!(render_tier(Tier::Server, &axoncass).is_ok());
    }

    #[test]
    fn test_render_is_deterministic() {
        let axoncass = axoncass(indoc! {"
            apiVersion: axonops.com/v1beta1
            kind: AxonOpsCassandra
            metadata:
              name: demo
              namespace: ns
            spec:
              cassandra:
                replicas: 3
                persistentVolume:
                  size: 10Gi
                env:
                  - name: B
                    value: '2'
                  - name: A
                    value: '1'
        "});

        let rendered = |tier| {
            render_tier(tier, &axoncass)
                .unwrap()
                .iter()
                .map(manifest_json)
                .collect::<Vec<_>>()
        };
        for tier in [Tier::SearchIndex, Tier::Dashboard, Tier::Server, Tier::Database] {
            assert_eq!(rendered(tier), rendered(tier), "{tier} rendered differently");
        }
    }

    fn manifest_json(manifest: &Manifest) -> serde_json::Value {
        match manifest {
            Manifest::StatefulSet(sts) => serde_json::to_value(sts),
            Manifest::Deployment(deployment) => serde_json::to_value(deployment),
            Manifest::Service(svc) => serde_json::to_value(svc),
            Manifest::Ingress(ingress) => serde_json::to_value(ingress),
        }
        .unwrap()
    }
}
