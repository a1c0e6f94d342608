// From `CustomResource`
#![allow(clippy::default_trait_access)]

use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod schemas;

#[derive(CustomResource, Deserialize, Serialize, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "luxor.io",
    version = "v1",
    kind = "PeeringServer",
    plural = "peeringservers",
    shortname = "ps",
    namespaced,
    status = "PeeringServerStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct PeeringServerSpec {
    /// Number of pods in the cohort.
    #[schemars(schema_with = "schemas::non_negative_i32")]
    pub replicas: i32,

    /// Server-side ping cadence, in milliseconds.
    #[schemars(schema_with = "schemas::positive_i64")]
    pub ping_interval: i64,

    /// HTTP port used for both health and ping.
    #[serde(default = "default_port")]
    #[schemars(schema_with = "schemas::port", default = "default_port")]
    pub port: i32,

    /// Container image for the managed server.
    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default)]
    pub resources: ResourceRequirements,
}

fn default_port() -> i32 {
    8080
}

fn default_image() -> String {
    "peering-server:latest".to_owned()
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default = "ResourceQuantities::default_requests")]
    pub requests: ResourceQuantities,
    #[serde(default = "ResourceQuantities::default_limits")]
    pub limits: ResourceQuantities,
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self {
            requests: ResourceQuantities::default_requests(),
            limits: ResourceQuantities::default_limits(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, JsonSchema)]
pub struct ResourceQuantities {
    pub cpu: String,
    pub memory: String,
}

impl ResourceQuantities {
    fn default_requests() -> Self {
        Self {
            cpu: "100m".to_owned(),
            memory: "128Mi".to_owned(),
        }
    }

    fn default_limits() -> Self {
        Self {
            cpu: "200m".to_owned(),
            memory: "256Mi".to_owned(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeeringServerStatus {
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
    pub phase: Option<PeeringServerPhase>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Human-readable detail, set when `phase == Failed`.
    pub message: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Copy, Clone, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum PeeringServerPhase {
    Running,
    Failed,
}

/// Spec fails validation: `replicas < 0` or `pingInterval <= 0`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("spec.replicas must not be negative, got {0}")]
    NegativeReplicas(i32),
    #[error("spec.pingInterval must be positive, got {0}")]
    NonPositivePingInterval(i64),
}

impl PeeringServerSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.replicas < 0 {
            return Err(ValidationError::NegativeReplicas(self.replicas));
        }
        if self.ping_interval <= 0 {
            return Err(ValidationError::NonPositivePingInterval(self.ping_interval));
        }
        Ok(())
    }
}

impl PeeringServer {
    /// The deterministic per-pod DNS identity for ordinal `i` in this cohort.
    ///
    /// `<ps>-<i>.<ps>-headless.<ns>.svc.cluster.local`
    pub fn pod_fqdn(&self, ordinal: i32, namespace: &str) -> String {
        let name = self.name_any();
        format!("{name}-{ordinal}.{name}-headless.{namespace}.svc.cluster.local")
    }

    pub fn config_map_name(&self) -> String {
        format!("{}-config", self.name_any())
    }

    pub fn headless_service_name(&self) -> String {
        format!("{}-headless", self.name_any())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(replicas: i32, ping_interval: i64) -> PeeringServerSpec {
        PeeringServerSpec {
            replicas,
            ping_interval,
            port: default_port(),
            image: default_image(),
            resources: ResourceRequirements::default(),
        }
    }

    #[test]
    fn rejects_negative_replicas() {
        assert_eq!(
            spec(-1, 1000).validate(),
            Err(ValidationError::NegativeReplicas(-1))
        );
    }

    #[test]
    fn rejects_non_positive_ping_interval() {
        assert_eq!(
            spec(3, 0).validate(),
            Err(ValidationError::NonPositivePingInterval(0))
        );
        assert_eq!(
            spec(3, -5).validate(),
            Err(ValidationError::NonPositivePingInterval(-5))
        );
    }

    #[test]
    fn accepts_zero_replicas() {
        assert!(spec(0, 1000).validate().is_ok());
    }

    #[test]
    fn defaults_port_and_image() {
        let json = serde_json::json!({ "replicas": 2, "pingInterval": 60000 });
        let spec: PeeringServerSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.port, 8080);
        assert_eq!(spec.image, "peering-server:latest");
        assert_eq!(spec.resources.requests.cpu, "100m");
        assert_eq!(spec.resources.limits.memory, "256Mi");
    }
}
