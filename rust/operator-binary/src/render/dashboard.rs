use stackable_operator::k8s_openapi::api::{
    apps::v1::{Deployment, DeploymentSpec},
    core::v1::{Container, PodSpec, PodTemplateSpec, Service, ServiceSpec},
    networking::v1::{
        HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
        IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
    },
};

use super::{
    IngressWithoutHostsSnafu, Result, UnsupportedIngressApiVersionSnafu,
    UnsupportedIngressPathTypeSnafu, container_port, label_selector, node_name_env_var,
    object_meta, pod_template_meta, pull_policy, resource_requirements, selector_labels,
    service_port, tier_meta, with_user_env,
};
use crate::{
    config::{DEFAULT_INGRESS_API_VERSION, DashboardConfig, IngressConfig, ObjectConfig},
    crd::{DASHBOARD_HTTP_PORT, DASHBOARD_HTTP_PORT_NAME, SERVER_API_PORT, Tier},
};

const CONTAINER_NAME: &str = "axon-dash";
const DASHBOARD_CONFIG_FILE: &str = "/etc/axonops/axon-dash.yml";
const DASHBOARD_BINARY: &str = "/usr/share/axonops/axon-dash";

const SUPPORTED_PATH_TYPES: [&str; 3] = ["Exact", "Prefix", "ImplementationSpecific"];

pub fn build_deployment(config: &DashboardConfig) -> Result<Deployment> {
    let object = &config.object;

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(config.container.image.clone()),
        image_pull_policy: pull_policy(&config.container),
        command: Some(vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            start_command(object),
        ]),
        ports: Some(vec![container_port(
            DASHBOARD_HTTP_PORT_NAME,
            DASHBOARD_HTTP_PORT,
        )]),
        env: Some(with_user_env(
            vec![node_name_env_var()],
            &config.container.env,
        )),
        resources: Some(resource_requirements(&config.container.resources)),
        ..Container::default()
    };

    Ok(Deployment {
        metadata: tier_meta(object)?,
        spec: Some(DeploymentSpec {
            replicas: Some(config.replicas),
            selector: label_selector(object),
            template: PodTemplateSpec {
                metadata: Some(pod_template_meta(object)),
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        status: None,
    })
}

/// Points the dashboard at the server API before starting it
fn start_command(object: &ObjectConfig) -> String {
    let server_api = format!(
        "http://{host}:{SERVER_API_PORT}",
        host = object.companion_name(Tier::Server)
    );
    format!(
        "sed -i 's|private_endpoints.*|private_endpoints: {server_api}|' {DASHBOARD_CONFIG_FILE} \
         && {DASHBOARD_BINARY} --appimage-extract-and-run"
    )
}

pub fn build_service(config: &DashboardConfig) -> Result<Service> {
    Ok(Service {
        metadata: tier_meta(&config.object)?,
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(&config.object)),
            ports: Some(vec![service_port(
                DASHBOARD_HTTP_PORT_NAME,
                DASHBOARD_HTTP_PORT,
            )]),
            ..ServiceSpec::default()
        }),
        status: None,
    })
}

/// Routes every configured host to the dashboard Service.
///
/// Without explicit TLS entries a single entry covering all hosts with the secret
/// `<composite name>-tls` is generated. At least one host is required, an Ingress without rules
/// or default backend is rejected by the API server.
pub fn build_ingress(object: &ObjectConfig, ingress: &IngressConfig) -> Result<Ingress> {
    snafu::ensure!(
        ingress.api_version == DEFAULT_INGRESS_API_VERSION,
        UnsupportedIngressApiVersionSnafu {
            api_version: &ingress.api_version
        }
    );
    snafu::ensure!(
        SUPPORTED_PATH_TYPES.contains(&ingress.path_type.as_str()),
        UnsupportedIngressPathTypeSnafu {
            path_type: &ingress.path_type
        }
    );
    snafu::ensure!(
        !ingress.hosts.is_empty(),
        IngressWithoutHostsSnafu { name: &object.name }
    );

    let rules = ingress
        .hosts
        .iter()
        .map(|host| IngressRule {
            host: Some(host.clone()),
            http: Some(HTTPIngressRuleValue {
                paths: vec![HTTPIngressPath {
                    path: Some(ingress.path.clone()),
                    path_type: ingress.path_type.clone(),
                    backend: IngressBackend {
                        service: Some(IngressServiceBackend {
                            name: object.name.clone(),
                            port: Some(ServiceBackendPort {
                                number: Some(DASHBOARD_HTTP_PORT.into()),
                                ..ServiceBackendPort::default()
                            }),
                        }),
                        ..IngressBackend::default()
                    },
                }],
            }),
        })
        .collect::<Vec<_>>();

    let tls = if ingress.tls.is_empty() {
        vec![IngressTLS {
            hosts: Some(ingress.hosts.clone()),
            secret_name: Some(format!("{}-tls", object.composite_name)),
        }]
    } else {
        ingress.tls.clone()
    };

    Ok(Ingress {
        metadata: object_meta(object, &object.name, &ingress.labels, &ingress.annotations)?,
        spec: Some(IngressSpec {
            ingress_class_name: ingress.class_name.clone(),
            rules: Some(rules),
            tls: Some(tls),
            ..IngressSpec::default()
        }),
        status: None,
    })
}
