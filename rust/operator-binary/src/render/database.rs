use stackable_operator::k8s_openapi::api::{
    apps::v1::{StatefulSet, StatefulSetSpec},
    core::v1::{
        Container, EnvVar, ExecAction, Lifecycle, LifecycleHandler, PodSpec, PodTemplateSpec,
        Probe, Service, ServicePort, ServiceSpec, VolumeMount,
    },
};

use super::{
    DATA_VOLUME_NAME, Result, container_port, env_var, field_ref_env_var, label_selector,
    node_name_env_var, object_meta, pod_template_meta, pull_policy, resource_requirements,
    selector_labels, service_port, tier_meta, volume_claim_template, with_user_env,
};
use crate::{
    config::DatabaseConfig,
    crd::{
        CQL_PORT, CQL_PORT_NAME, INTRA_NODE_PORT, INTRA_NODE_PORT_NAME, JMX_PORT, JMX_PORT_NAME,
        SERVER_AGENT_PORT, TLS_PORT, TLS_PORT_NAME, Tier, tier::headless_service_name,
    },
};

const CONTAINER_NAME: &str = "cassandra";
const DATA_DIR: &str = "/var/lib/cassandra";

const LIVENESS_CHECK: &str = r#"nodetool info | grep "Native Transport active: true""#;
const READINESS_CHECK: &str = r#"nodetool status | grep -E "^UN\s+${POD_IP}""#;

pub fn build_statefulset(config: &DatabaseConfig) -> Result<StatefulSet> {
    let object = &config.object;

    let mut container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(config.container.image.clone()),
        image_pull_policy: pull_policy(&config.container),
        ports: Some(vec![
            container_port(CQL_PORT_NAME, CQL_PORT),
            container_port(JMX_PORT_NAME, JMX_PORT),
            container_port(INTRA_NODE_PORT_NAME, INTRA_NODE_PORT),
            container_port(TLS_PORT_NAME, TLS_PORT),
        ]),
        env: Some(with_user_env(env(config), &config.container.env)),
        resources: Some(resource_requirements(&config.container.resources)),
        liveness_probe: Some(nodetool_probe(LIVENESS_CHECK)),
        readiness_probe: Some(nodetool_probe(READINESS_CHECK)),
        startup_probe: Some(nodetool_probe(READINESS_CHECK)),
        lifecycle: Some(Lifecycle {
            pre_stop: Some(LifecycleHandler {
                exec: Some(ExecAction {
                    command: Some(vec![
                        "bash".to_string(),
                        "-ec".to_string(),
                        pre_stop_command(config).to_string(),
                    ]),
                }),
                ..LifecycleHandler::default()
            }),
            ..Lifecycle::default()
        }),
        ..Container::default()
    };

    let volume_claim_templates = match &config.storage {
        Some(storage) => {
            container.volume_mounts = Some(vec![VolumeMount {
                name: DATA_VOLUME_NAME.to_string(),
                mount_path: DATA_DIR.to_string(),
                ..VolumeMount::default()
            }]);
            Some(vec![volume_claim_template(storage)])
        }
        None => None,
    };

    Ok(StatefulSet {
        metadata: tier_meta(object)?,
        spec: Some(StatefulSetSpec {
            service_name: Some(object.name.clone()),
            replicas: Some(config.replicas),
            selector: label_selector(object),
            template: PodTemplateSpec {
                metadata: Some(pod_template_meta(object)),
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..PodSpec::default()
                }),
            },
            volume_claim_templates,
            ..StatefulSetSpec::default()
        }),
        status: None,
    })
}

/// A node with persistent storage keeps its data and only flushes it, an ephemeral node hands its
/// token ranges over to the remaining nodes.
fn pre_stop_command(config: &DatabaseConfig) -> &'static str {
    if config.storage.is_some() {
        "nodetool drain"
    } else {
        "nodetool decommission"
    }
}

fn env(config: &DatabaseConfig) -> Vec<EnvVar> {
    let object = &config.object;
    vec![
        env_var("CASSANDRA_CLUSTER_NAME", &config.cluster_name),
        env_var("CASSANDRA_SEEDS", seed_address(config)),
        env_var("CASSANDRA_ENDPOINT_SNITCH", "GossipingPropertyFileSnitch"),
        env_var("CASSANDRA_DC", &config.dc),
        env_var("CASSANDRA_RACK", "rack1"),
        env_var("CASSANDRA_BROADCAST_RPC_ADDRESS", "127.0.0.1"),
        env_var("CASSANDRA_NATIVE_TRANSPORT_PORT", CQL_PORT.to_string()),
        env_var("MAX_HEAP_SIZE", &config.heap_size),
        env_var("HEAP_NEWSIZE", "50m"),
        env_var("AXON_AGENT_SERVER_HOST", object.companion_name(Tier::Server)),
        env_var("AXON_AGENT_SERVER_PORT", SERVER_AGENT_PORT.to_string()),
        env_var("AXON_AGENT_ORG", "developer"),
        env_var("AXON_AGENT_TLS_MODE", "none"),
        env_var("AXON_AGENT_LOG_OUTPUT", "file"),
        node_name_env_var(),
        field_ref_env_var("POD_IP", "status.podIP"),
        env_var("JVM_EXTRA_OPTS", &config.java_opts),
    ]
}

/// FQDN of the first pod of the StatefulSet, addressed through the governing Service
fn seed_address(config: &DatabaseConfig) -> String {
    let object = &config.object;
    format!(
        "{name}-0.{name}.{namespace}.svc.{cluster_domain}",
        name = object.name,
        namespace = object.namespace,
        cluster_domain = config.cluster_domain
    )
}

fn nodetool_probe(check: &str) -> Probe {
    Probe {
        exec: Some(ExecAction {
            command: Some(vec![
                "/bin/bash".to_string(),
                "-ec".to_string(),
                check.to_string(),
            ]),
        }),
        initial_delay_seconds: Some(60),
        period_seconds: Some(30),
        timeout_seconds: Some(30),
        success_threshold: Some(1),
        failure_threshold: Some(5),
        ..Probe::default()
    }
}

pub fn build_service(config: &DatabaseConfig) -> Result<Service> {
    Ok(Service {
        metadata: tier_meta(&config.object)?,
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(&config.object)),
            ports: Some(service_ports()),
            ..ServiceSpec::default()
        }),
        status: None,
    })
}

/// Resolves every node, ready or not, which lets joining nodes find each other
pub fn build_headless_service(config: &DatabaseConfig) -> Result<Service> {
    let object = &config.object;
    Ok(Service {
        metadata: object_meta(
            object,
            &headless_service_name(&object.composite_name),
            &object.labels,
            &object.annotations,
        )?,
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            publish_not_ready_addresses: Some(true),
            selector: Some(selector_labels(object)),
            ports: Some(service_ports()),
            ..ServiceSpec::default()
        }),
        status: None,
    })
}

fn service_ports() -> Vec<ServicePort> {
    vec![
        service_port(INTRA_NODE_PORT_NAME, INTRA_NODE_PORT),
        service_port(TLS_PORT_NAME, TLS_PORT),
        service_port(JMX_PORT_NAME, JMX_PORT),
        service_port(CQL_PORT_NAME, CQL_PORT),
    ]
}
