use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    api::{ObjectMeta, PostParams},
    Api, Client, ResourceExt,
};
use tracing::debug;

use crate::{resource::PeeringServer, wire::PeerConfig};

const CONFIG_KEY: &str = "config.json";

/// Creates or fully replaces the cohort's ConfigMap. `data` is always overwritten
/// wholesale; no merge with whatever keys happen to already be present.
pub(super) async fn reconcile(
    ps: &PeeringServer,
    namespace: &str,
    client: Client,
) -> kube::Result<()> {
    let api: Api<ConfigMap> = Api::namespaced(client, namespace);
    let name = ps.config_map_name();
    let mut desired = build_config_map(ps, namespace);

    match api.get_opt(&name).await? {
        None => {
            debug!("creating ConfigMap {}", name);
            api.create(&PostParams::default(), &desired).await?;
        }
        Some(existing) => {
            if existing.data == desired.data {
                return Ok(());
            }
            debug!("replacing ConfigMap {}", name);
            desired.metadata.resource_version = existing.resource_version();
            api.replace(&name, &PostParams::default(), &desired).await?;
        }
    }
    Ok(())
}

fn build_config_map(ps: &PeeringServer, namespace: &str) -> ConfigMap {
    let name = ps.config_map_name();
    let config = PeerConfig::for_cohort(ps, namespace);
    let mut data = BTreeMap::new();
    data.insert(
        CONFIG_KEY.to_owned(),
        serde_json::to_string(&config).expect("PeerConfig always serializes"),
    );

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace.to_owned()),
            owner_references: Some(vec![super::to_owner_reference(ps)]),
            labels: Some(super::make_common_labels(&ps.name_any())),
            ..ObjectMeta::default()
        },
        data: Some(data),
        ..ConfigMap::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ps(name: &str, replicas: i32, ping_interval: i64) -> PeeringServer {
        PeeringServer {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                uid: Some("uid-1".to_owned()),
                ..Default::default()
            },
            spec: crate::resource::PeeringServerSpec {
                replicas,
                ping_interval,
                port: 8080,
                image: "peering-server:latest".to_owned(),
                resources: Default::default(),
            },
            status: None,
        }
    }

    #[test]
    fn builds_deterministic_config_json() {
        let ps = ps("small", 3, 60_000);
        let cm = build_config_map(&ps, "default");
        assert_eq!(cm.metadata.name.as_deref(), Some("small-config"));
        let raw = cm.data.as_ref().unwrap().get(CONFIG_KEY).unwrap();
        let parsed: PeerConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.peers.len(), 3);
        assert_eq!(parsed.ping_interval, 60_000);
        assert_eq!(
            parsed.peers[0].host,
            "small-0.small-headless.default.svc.cluster.local"
        );
    }

    #[test]
    fn is_idempotent_across_repeated_builds() {
        let ps = ps("small", 3, 60_000);
        let a = build_config_map(&ps, "default");
        let b = build_config_map(&ps, "default");
        assert_eq!(a.data, b.data);
        assert_eq!(a.metadata.labels, b.metadata.labels);
    }

    #[test]
    fn owner_reference_marks_peering_server_as_controller() {
        let ps = ps("small", 1, 1000);
        let cm = build_config_map(&ps, "default");
        let owner = &cm.metadata.owner_references.unwrap()[0];
        assert_eq!(owner.name, "small");
        assert_eq!(owner.controller, Some(true));
        assert_eq!(owner.block_owner_deletion, Some(true));
    }
}
