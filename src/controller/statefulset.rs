use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{StatefulSet, StatefulSetSpec},
        core::v1::{
            ConfigMapVolumeSource, Container, ContainerPort, EnvVar, EnvVarSource, HTTPGetAction,
            ObjectFieldSelector, PodSpec, PodTemplateSpec, Probe, ResourceRequirements as K8sResourceRequirements,
            Volume, VolumeMount,
        },
    },
    apimachinery::pkg::{apis::meta::v1::LabelSelector, util::intstr::IntOrString},
};
use kube::{
    api::{ObjectMeta, PostParams},
    Api, Client, ResourceExt,
};
use tracing::debug;

use crate::resource::PeeringServer;

const MOUNT_PATH: &str = "/etc/peering";
const CONTAINER_NAME: &str = "peering-server";

/// Creates or replaces the StatefulSet. `spec.selector` and `spec.serviceName` are
/// immutable once set and are never recomputed from anything but the (constant)
/// object name, so a naive full replace never collides with them in practice.
pub(super) async fn reconcile(
    ps: &PeeringServer,
    namespace: &str,
    client: Client,
) -> kube::Result<()> {
    let api: Api<StatefulSet> = Api::namespaced(client, namespace);
    let name = ps.name_any();
    let mut desired = build_statefulset(ps, namespace);

    match api.get_opt(&name).await? {
        None => {
            debug!("creating StatefulSet {}", name);
            api.create(&PostParams::default(), &desired).await?;
        }
        Some(existing) => {
            if existing.spec == desired.spec {
                return Ok(());
            }
            debug!("replacing StatefulSet {}", name);
            desired.metadata.resource_version = existing.resource_version();
            api.replace(&name, &PostParams::default(), &desired).await?;
        }
    }
    Ok(())
}

fn build_statefulset(ps: &PeeringServer, namespace: &str) -> StatefulSet {
    let name = ps.name_any();
    let labels = super::make_common_labels(&name);
    let selector = BTreeMap::from([("app".to_owned(), name.clone())]);

    StatefulSet {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace.to_owned()),
            owner_references: Some(vec![super::to_owner_reference(ps)]),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(StatefulSetSpec {
            service_name: ps.headless_service_name(),
            replicas: Some(ps.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(selector.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(selector),
                    ..ObjectMeta::default()
                }),
                spec: Some(build_pod_spec(ps)),
            },
            ..StatefulSetSpec::default()
        }),
        ..StatefulSet::default()
    }
}

fn build_pod_spec(ps: &PeeringServer) -> PodSpec {
    let probe = Probe {
        http_get: Some(HTTPGetAction {
            path: Some("/health".to_owned()),
            port: IntOrString::Int(ps.spec.port),
            ..HTTPGetAction::default()
        }),
        ..Probe::default()
    };

    PodSpec {
        containers: vec![Container {
            name: CONTAINER_NAME.to_owned(),
            image: Some(ps.spec.image.clone()),
            ports: Some(vec![ContainerPort {
                name: Some("http".to_owned()),
                container_port: ps.spec.port,
                ..ContainerPort::default()
            }]),
            env: Some(vec![
                EnvVar {
                    name: "PORT".to_owned(),
                    value: Some(ps.spec.port.to_string()),
                    ..EnvVar::default()
                },
                EnvVar {
                    name: "CONFIG_PATH".to_owned(),
                    value: Some(format!("{MOUNT_PATH}/config.json")),
                    ..EnvVar::default()
                },
                EnvVar {
                    name: "POD_NAME".to_owned(),
                    value_from: Some(EnvVarSource {
                        field_ref: Some(ObjectFieldSelector {
                            field_path: "metadata.name".to_owned(),
                            ..ObjectFieldSelector::default()
                        }),
                        ..EnvVarSource::default()
                    }),
                    ..EnvVar::default()
                },
            ]),
            volume_mounts: Some(vec![VolumeMount {
                name: "config".to_owned(),
                mount_path: MOUNT_PATH.to_owned(),
                read_only: Some(true),
                ..VolumeMount::default()
            }]),
            resources: Some(resource_requirements(ps)),
            liveness_probe: Some(probe.clone()),
            readiness_probe: Some(probe),
            ..Container::default()
        }],
        volumes: Some(vec![Volume {
            name: "config".to_owned(),
            config_map: Some(ConfigMapVolumeSource {
                name: Some(ps.config_map_name()),
                ..ConfigMapVolumeSource::default()
            }),
            ..Volume::default()
        }]),
        enable_service_links: Some(false),
        ..PodSpec::default()
    }
}

fn resource_requirements(ps: &PeeringServer) -> K8sResourceRequirements {
    let quantity = |s: &str| k8s_openapi::apimachinery::pkg::api::resource::Quantity(s.to_owned());
    K8sResourceRequirements {
        requests: Some(BTreeMap::from([
            ("cpu".to_owned(), quantity(&ps.spec.resources.requests.cpu)),
            (
                "memory".to_owned(),
                quantity(&ps.spec.resources.requests.memory),
            ),
        ])),
        limits: Some(BTreeMap::from([
            ("cpu".to_owned(), quantity(&ps.spec.resources.limits.cpu)),
            (
                "memory".to_owned(),
                quantity(&ps.spec.resources.limits.memory),
            ),
        ])),
        ..K8sResourceRequirements::default()
    }
}
