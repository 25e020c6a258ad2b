use stackable_operator::k8s_openapi::api::{
    apps::v1::{StatefulSet, StatefulSetSpec},
    core::v1::{Container, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec},
};

use super::{
    Result, container_port, env_var, label_selector, node_name_env_var, pod_template_meta,
    pull_policy, resource_requirements, selector_labels, service_port, tier_meta, with_user_env,
};
use crate::{
    config::ServerConfig,
    crd::{
        ELASTIC_REST_PORT, SERVER_AGENT_PORT, SERVER_AGENT_PORT_NAME, SERVER_API_PORT,
        SERVER_API_PORT_NAME, SERVER_METRICS_PORT, SERVER_METRICS_PORT_NAME, Tier,
    },
};

const CONTAINER_NAME: &str = "axon-server";

pub fn build_statefulset(config: &ServerConfig) -> Result<StatefulSet> {
    let object = &config.object;
    let elastic_hosts = format!(
        "http://{host}:{ELASTIC_REST_PORT}",
        host = object.companion_name(Tier::SearchIndex)
    );

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(config.container.image.clone()),
        image_pull_policy: pull_policy(&config.container),
        ports: Some(vec![
            container_port(SERVER_API_PORT_NAME, SERVER_API_PORT),
            container_port(SERVER_AGENT_PORT_NAME, SERVER_AGENT_PORT),
            container_port(SERVER_METRICS_PORT_NAME, SERVER_METRICS_PORT),
        ]),
        env: Some(with_user_env(
            vec![env_var("ELASTIC_HOSTS", elastic_hosts), node_name_env_var()],
            &config.container.env,
        )),
        resources: Some(resource_requirements(&config.container.resources)),
        ..Container::default()
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
            ..StatefulSetSpec::default()
        }),
        status: None,
    })
}

pub fn build_service(config: &ServerConfig) -> Result<Service> {
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

fn service_ports() -> Vec<ServicePort> {
    vec![
        service_port(SERVER_API_PORT_NAME, SERVER_API_PORT),
        service_port(SERVER_AGENT_PORT_NAME, SERVER_AGENT_PORT),
        service_port(SERVER_METRICS_PORT_NAME, SERVER_METRICS_PORT),
    ]
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use stackable_operator::k8s_openapi::apimachinery::pkg::{
        api::resource::Quantity, util::intstr::IntOrString,
    };

    use super::*;
    use crate::{
        config::{self, DerivedConfig},
        crd::AxonOpsCassandra,
        test_utils::cluster_info,
    };

    fn server_config(input: &str) -> ServerConfig {
        let axoncass: AxonOpsCassandra = serde_yaml::from_str(input).unwrap();
        match config::derive(Tier::Server, &axoncass, &cluster_info()) {
            DerivedConfig::Server(config) => config,
            other => panic!("expected server config, got {other:?}"),
        }
    }

    #[test]
    fn test_statefulset() {
        let config = server_config(indoc! {"
            apiVersion: axonops.com/v1beta1
            kind: AxonOpsCassandra
            metadata:
              name: demo
              namespace: ns
            spec:
              axonops:
                server:
                  image:
                    tag: 2.0.1
                  pullPolicy: Always
                  env:
                    - name: LOG_LEVEL
                      value: debug
                  resources:
                    limits:
                      memory: 1Gi
        "});
        let sts = build_statefulset(&config).unwrap();
        let pod = sts.spec.unwrap().template.spec.unwrap();
        let container = &pod.containers[0];

        assert_eq!(sts.metadata.name.as_deref(), Some("as-demo"));
        assert_eq!(
            container.image.as_deref(),
            Some("registry.axonops.com/axonops-public/axonops-docker/axon-server:2.0.1")
        );
        assert_eq!(container.image_pull_policy.as_deref(), Some("Always"));

        let env = container.env.as_ref().unwrap();
        assert_eq!(env[0].name, "ELASTIC_HOSTS");
        assert_eq!(env[0].value.as_deref(), Some("http://es-demo:9200"));
        assert_eq!(env[2].name, "LOG_LEVEL");

        let resources = container.resources.as_ref().unwrap();
        let limits = resources.limits.as_ref().unwrap();
        let requests = resources.requests.as_ref().unwrap();
        assert_eq!(limits["memory"], Quantity("1Gi".to_string()));
        assert_eq!(limits["cpu"], Quantity("1000m".to_string()));
        assert_eq!(requests["cpu"], Quantity("250m".to_string()));
        assert_eq!(requests["memory"], Quantity("256Mi".to_string()));
    }

    #[test]
    fn test_service_targets_named_ports() {
        let config = server_config(indoc! {"
            apiVersion: axonops.com/v1beta1
            kind: AxonOpsCassandra
            metadata:
              name: demo
              namespace: ns
            spec: {}
        "});
        let service = build_service(&config).unwrap();
        let spec = service.spec.unwrap();

        assert_eq!(
            spec.selector,
            Some([("app".to_string(), "as-demo".to_string())].into())
        );
        for port in spec.ports.unwrap() {
            assert_eq!(port.target_port, port.name.map(IntOrString::String));
        }
    }
}
