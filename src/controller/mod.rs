use std::{collections::BTreeMap, sync::Arc, time::Duration};

use futures::StreamExt;
use k8s_openapi::{
    api::{
        apps::v1::StatefulSet,
        core::v1::{ConfigMap, Service},
    },
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, Resource, ResourceExt,
};
use tracing::{debug, error, warn};

use crate::resource::PeeringServer;

mod configmap;
mod statefulset;
mod status;
mod svc;

const PROJECT_NAME: &str = "peering-operator";

/// Safety-net resync interval: catches drift the watch stream missed without
/// waiting for an external edit.
const RESYNC_AFTER: Duration = Duration::from_secs(300);
/// Requeue delay after a transient error (409 conflict, 5xx, network failure).
const RETRY_AFTER: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("spec validation failed: {0}")]
    Validation(#[from] crate::resource::ValidationError),

    #[error("failed to reconcile ConfigMap: {0}")]
    ReconcileConfigMap(#[source] kube::Error),

    #[error("failed to reconcile Service: {0}")]
    ReconcileService(#[source] kube::Error),

    #[error("failed to reconcile StatefulSet: {0}")]
    ReconcileStatefulSet(#[source] kube::Error),

    #[error("object is missing .metadata.name")]
    MissingName,
}
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Dependencies shared by every reconcile invocation.
pub struct ContextData {
    pub client: Client,
}

/// Starts the Watch Engine and runs it to completion (it normally never completes;
/// it returns once the underlying stream is shut down, e.g. on process termination).
pub async fn run(client: Client, namespace: String) {
    let context = Arc::new(ContextData {
        client: client.clone(),
    });

    let peering_servers = Api::<PeeringServer>::namespaced(client.clone(), &namespace);
    if let Err(e) = peering_servers.list(&Default::default()).await {
        error!(
            "PeeringServer CRD is not queryable in namespace {}: {}. Is the CRD installed?",
            namespace, e
        );
        std::process::exit(1);
    }

    let configmaps = Api::<ConfigMap>::namespaced(client.clone(), &namespace);
    let services = Api::<Service>::namespaced(client.clone(), &namespace);
    let statefulsets = Api::<StatefulSet>::namespaced(client, &namespace);

    // `watcher::Config::default()` carries kube-runtime's built-in reconnect backoff
    // (see DESIGN.md) rather than a hand-rolled one here.
    Controller::new(peering_servers, watcher::Config::default())
        .owns(configmaps, watcher::Config::default())
        .owns(services, watcher::Config::default())
        .owns(statefulsets, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => {
                    debug!(
                        "reconciled {}/{}: requeue after {:?}",
                        obj.namespace.as_deref().unwrap_or("-"),
                        obj.name,
                        action.requeue_after
                    );
                }
                Err(e) => warn!("reconcile failed: {}", e),
            }
        })
        .await;
}

#[tracing::instrument(skip_all, fields(namespace = %ps.namespace().unwrap_or_default(), name = %ps.name_any()), err)]
async fn reconcile(ps: Arc<PeeringServer>, ctx: Arc<ContextData>) -> Result<Action> {
    match try_reconcile(&ps, &ctx).await {
        Ok(action) => {
            status::mark_running(&ps, ctx.client.clone())
                .await
                .unwrap_or_else(|e| warn!("status patch failed (non-fatal): {}", e));
            Ok(action)
        }
        Err(e) => {
            status::mark_failed(&ps, ctx.client.clone(), e.to_string())
                .await
                .unwrap_or_else(|e| warn!("status patch failed (non-fatal): {}", e));
            Err(e)
        }
    }
}

/// The reconciliation algorithm proper: default & validate, then converge
/// ConfigMap → Service → StatefulSet in that strict order.
async fn try_reconcile(ps: &PeeringServer, ctx: &ContextData) -> Result<Action> {
    ps.spec.validate()?;

    let namespace = ps.namespace().ok_or(Error::MissingName)?;
    let client = ctx.client.clone();

    configmap::reconcile(ps, &namespace, client.clone())
        .await
        .map_err(Error::ReconcileConfigMap)?;
    svc::reconcile(ps, &namespace, client.clone())
        .await
        .map_err(Error::ReconcileService)?;
    statefulset::reconcile(ps, &namespace, client)
        .await
        .map_err(Error::ReconcileStatefulSet)?;

    Ok(Action::requeue(RESYNC_AFTER))
}

fn error_policy(ps: Arc<PeeringServer>, error: &Error, _ctx: Arc<ContextData>) -> Action {
    warn!(
        "reconciler failed for {}/{}: {}",
        ps.namespace().unwrap_or_default(),
        ps.name_any(),
        error
    );
    Action::requeue(RETRY_AFTER)
}

fn make_common_labels(name: &str) -> BTreeMap<String, String> {
    [
        ("app", name),
        ("app.kubernetes.io/managed-by", PROJECT_NAME),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect()
}

fn to_owner_reference(ps: &PeeringServer) -> OwnerReference {
    OwnerReference {
        api_version: PeeringServer::api_version(&()).to_string(),
        kind: PeeringServer::kind(&()).to_string(),
        name: ps.name_any(),
        uid: ps.uid().expect(".metadata.uid"),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}
