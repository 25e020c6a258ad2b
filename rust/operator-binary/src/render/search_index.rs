use stackable_operator::k8s_openapi::api::{
    apps::v1::{StatefulSet, StatefulSetSpec},
    core::v1::{
        Container, PodSpec, PodTemplateSpec, SecurityContext, Service, ServiceSpec, VolumeMount,
    },
};

use super::{
    DATA_VOLUME_NAME, Result, container_port, env_var, label_selector, node_name_env_var,
    pod_template_meta, pull_policy, resource_requirements, selector_labels, service_port,
    tier_meta, volume_claim_template, with_user_env,
};
use crate::{
    config::SearchIndexConfig,
    crd::{
        ELASTIC_REST_PORT, ELASTIC_REST_PORT_NAME, ELASTIC_TRANSPORT_PORT,
        ELASTIC_TRANSPORT_PORT_NAME,
    },
};

const CONTAINER_NAME: &str = "elasticsearch";
const DATA_DIR: &str = "/usr/share/elasticsearch/data";

const SYSCTL_IMAGE: &str = "busybox:stable";
const MAX_MAP_COUNT: u32 = 262144;

pub fn build_statefulset(config: &SearchIndexConfig) -> Result<StatefulSet> {
    let object = &config.object;

    let mut container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(config.container.image.clone()),
        image_pull_policy: pull_policy(&config.container),
        ports: Some(vec![
            container_port(ELASTIC_REST_PORT_NAME, ELASTIC_REST_PORT),
            container_port(ELASTIC_TRANSPORT_PORT_NAME, ELASTIC_TRANSPORT_PORT),
        ]),
        env: Some(with_user_env(
            vec![
                env_var("cluster.name", &config.cluster_name),
                node_name_env_var(),
                env_var("ES_JAVA_OPTS", &config.java_opts),
                env_var("discovery.type", "single-node"),
            ],
            &config.container.env,
        )),
        resources: Some(resource_requirements(&config.container.resources)),
        ..Container::default()
    };

    let volume_claim_templates = config.storage.as_ref().map(|storage| {
        container.volume_mounts = Some(vec![VolumeMount {
            name: DATA_VOLUME_NAME.to_string(),
            mount_path: DATA_DIR.to_string(),
            ..VolumeMount::default()
        }]);
        vec![volume_claim_template(storage)]
    });

    Ok(StatefulSet {
        metadata: tier_meta(object)?,
        spec: Some(StatefulSetSpec {
            service_name: Some(object.name.clone()),
            replicas: Some(config.replicas),
            selector: label_selector(object),
            template: PodTemplateSpec {
                metadata: Some(pod_template_meta(object)),
                spec: Some(PodSpec {
                    init_containers: Some(vec![sysctl_container()]),
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

/// Elasticsearch refuses to start with the kernel default `vm.max_map_count`
fn sysctl_container() -> Container {
    Container {
        name: "sysctl".to_string(),
        image: Some(SYSCTL_IMAGE.to_string()),
        command: Some(vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("sysctl -w vm.max_map_count={MAX_MAP_COUNT}"),
        ]),
        security_context: Some(SecurityContext {
            privileged: Some(true),
            run_as_user: Some(0),
            ..SecurityContext::default()
        }),
        ..Container::default()
    }
}

pub fn build_service(config: &SearchIndexConfig) -> Result<Service> {
    Ok(Service {
        metadata: tier_meta(&config.object)?,
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(&config.object)),
            ports: Some(vec![
                service_port(ELASTIC_REST_PORT_NAME, ELASTIC_REST_PORT),
                service_port(ELASTIC_TRANSPORT_PORT_NAME, ELASTIC_TRANSPORT_PORT),
            ]),
            ..ServiceSpec::default()
        }),
        status: None,
    })
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::{
        config::{self, DerivedConfig},
        crd::{AxonOpsCassandra, Tier},
        test_utils::cluster_info,
    };

    fn search_index_config(input: &str) -> SearchIndexConfig {
        let axoncass: AxonOpsCassandra = serde_yaml::from_str(input).unwrap();
        match config::derive(Tier::SearchIndex, &axoncass, &cluster_info()) {
            DerivedConfig::SearchIndex(config) => config,
            other => panic!("expected search index config, got {other:?}"),
        }
    }

    #[test]
    fn test_statefulset() {
        let config = search_index_config(indoc! {"
            apiVersion: axonops.com/v1beta1
            kind: AxonOpsCassandra
            metadata:
              name: demo
              namespace: ns
            spec:
              axonops:
                elasticsearch:
                  clusterName: metrics
                  persistentVolume:
                    size: 5Gi
                    storageClass: standard
        "});
        let sts = build_statefulset(&config).unwrap();
        let spec = sts.spec.unwrap();
        let pod = spec.template.spec.unwrap();

        assert_eq!(sts.metadata.name.as_deref(), Some("es-demo"));
        assert_eq!(spec.replicas, Some(1));

        let init_containers = pod.init_containers.unwrap();
        let init = &init_containers[0];
        assert_eq!(
            init.command.clone().unwrap(),
            vec!["sh", "-c", "sysctl -w vm.max_map_count=262144"]
        );
        assert_eq!(
            init.security_context.as_ref().unwrap().privileged,
            Some(true)
        );

        let container = &pod.containers[0];
        assert_eq!(
            container.image.as_deref(),
            Some("docker.elastic.co/elasticsearch/elasticsearch:7.17.0")
        );
        let env = container
            .env
            .as_ref()
            .unwrap()
            .iter()
            .map(|env| (env.name.as_str(), env.value.as_deref()))
            .collect::<Vec<_>>();
        assert_eq!(
            env,
            vec![
                ("cluster.name", Some("metrics")),
                ("node.name", None),
                ("ES_JAVA_OPTS", Some("-Xms512m -Xmx512m")),
                ("discovery.type", Some("single-node")),
            ]
        );
        assert_eq!(
            container.volume_mounts.as_ref().unwrap()[0].mount_path,
            "/usr/share/elasticsearch/data"
        );

        let claims = spec.volume_claim_templates.unwrap();
        let claim = &claims[0];
        assert_eq!(
            claim.spec.as_ref().unwrap().storage_class_name.as_deref(),
            Some("standard")
        );
    }

    #[test]
    fn test_service_ports() {
        let config = search_index_config(indoc! {"
            apiVersion: axonops.com/v1beta1
            kind: AxonOpsCassandra
            metadata:
              name: demo
              namespace: ns
            spec: {}
        "});
        let ports = build_service(&config).unwrap().spec.unwrap().ports.unwrap();

        assert_eq!(
            ports
                .iter()
                .map(|port| (port.name.as_deref().unwrap(), port.port))
                .collect::<Vec<_>>(),
            vec![("rest", 9200), ("inter-node", 9300)]
        );
    }
}
