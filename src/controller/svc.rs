use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{Service, ServicePort, ServiceSpec},
    apimachinery::pkg::util::intstr::IntOrString,
};
use kube::{
    api::{ObjectMeta, PostParams},
    Api, Client, ResourceExt,
};
use tracing::debug;

use crate::resource::PeeringServer;

/// Creates the headless Service, or replaces it while preserving `clusterIP` --
/// immutable once assigned.
pub(super) async fn reconcile(
    ps: &PeeringServer,
    namespace: &str,
    client: Client,
) -> kube::Result<()> {
    let api: Api<Service> = Api::namespaced(client, namespace);
    let name = ps.headless_service_name();
    let mut desired = build_service(ps, namespace);

    match api.get_opt(&name).await? {
        None => {
            debug!("creating Service {}", name);
            api.create(&PostParams::default(), &desired).await?;
        }
        Some(existing) => {
            if existing.spec == desired.spec {
                return Ok(());
            }
            debug!("replacing Service {}", name);
            desired.metadata.resource_version = existing.resource_version();
            if let (Some(existing_spec), Some(desired_spec)) =
                (existing.spec.as_ref(), desired.spec.as_mut())
            {
                desired_spec.cluster_ip = existing_spec.cluster_ip.clone();
                desired_spec.cluster_ips = existing_spec.cluster_ips.clone();
            }
            api.replace(&name, &PostParams::default(), &desired).await?;
        }
    }
    Ok(())
}

fn build_service(ps: &PeeringServer, namespace: &str) -> Service {
    let name = ps.headless_service_name();
    let selector_name = ps.name_any();

    Service {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.to_owned()),
            owner_references: Some(vec![super::to_owner_reference(ps)]),
            labels: Some(super::make_common_labels(&selector_name)),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_owned()),
            selector: Some(BTreeMap::from([("app".to_owned(), selector_name)])),
            ports: Some(vec![ServicePort {
                name: Some("http".to_owned()),
                port: ps.spec.port,
                target_port: Some(IntOrString::Int(ps.spec.port)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}
