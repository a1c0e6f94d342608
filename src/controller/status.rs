use chrono::Utc;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::{
    api::{Patch, PatchParams},
    Api, Client, ResourceExt,
};

use crate::resource::PeeringServer;

/// Reads the owned StatefulSet's observed replica counts and patches `.status` with
/// `phase: Running`. Errors here are advisory: the caller logs and moves on.
pub(super) async fn mark_running(ps: &PeeringServer, client: Client) -> kube::Result<()> {
    let name = ps.name_any();
    let namespace = ps.namespace().unwrap_or_default();
    let sts_api: Api<StatefulSet> = Api::namespaced(client.clone(), &namespace);
    let (replicas, ready_replicas) = match sts_api.get_opt(&name).await? {
        Some(sts) => {
            let status = sts.status.unwrap_or_default();
            (status.replicas, status.ready_replicas.unwrap_or(0))
        }
        None => (0, 0),
    };

    patch_status(
        ps,
        client,
        serde_json::json!({
            "replicas": replicas,
            "readyReplicas": ready_replicas,
            "phase": "Running",
            "lastUpdated": Utc::now().to_rfc3339(),
            "message": serde_json::Value::Null,
        }),
    )
    .await
}

/// Patches `.status` with `phase: Failed` and a message describing what went wrong.
pub(super) async fn mark_failed(
    ps: &PeeringServer,
    client: Client,
    message: String,
) -> kube::Result<()> {
    patch_status(
        ps,
        client,
        serde_json::json!({
            "phase": "Failed",
            "lastUpdated": Utc::now().to_rfc3339(),
            "message": message,
        }),
    )
    .await
}

async fn patch_status(
    ps: &PeeringServer,
    client: Client,
    status: serde_json::Value,
) -> kube::Result<()> {
    let name = ps.name_any();
    let namespace = ps.namespace().unwrap_or_default();
    let api: Api<PeeringServer> = Api::namespaced(client, &namespace);
    let patch = Patch::Merge(serde_json::json!({ "status": status }));
    api.patch_status(&name, &PatchParams::default(), &patch)
        .await?;
    Ok(())
}
