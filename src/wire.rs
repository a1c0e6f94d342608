//! The `config.json` wire format shared between the ConfigMap the Reconciler writes
//! and the managed server that mounts and parses it. Keeping one definition on both
//! sides of the contract is what keeps them checkable as ordinary Rust equality.
use serde::{Deserialize, Serialize};

use crate::resource::PeeringServer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerConfig {
    pub peers: Vec<Peer>,
    pub ping_interval: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub host: String,
    pub port: i32,
}

impl PeerConfig {
    /// The peer list for the cohort is every ordinal in `[0, replicas)`, including the
    /// pod's own ordinal -- self-ping doubles as a local liveness check.
    pub fn for_cohort(ps: &PeeringServer, namespace: &str) -> Self {
        let port = ps.spec.port;
        let peers = (0..ps.spec.replicas)
            .map(|i| Peer {
                host: ps.pod_fqdn(i, namespace),
                port,
            })
            .collect();
        Self {
            peers,
            ping_interval: ps.spec.ping_interval,
        }
    }

    pub fn empty(ping_interval: i64) -> Self {
        Self {
            peers: Vec::new(),
            ping_interval,
        }
    }
}

impl Default for PeerConfig {
    /// Built-in defaults used by the managed server when no config file is mounted yet.
    fn default() -> Self {
        Self::empty(60_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ObjectMeta;

    fn ps(name: &str, replicas: i32, port: i32, ping_interval: i64) -> PeeringServer {
        PeeringServer {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                ..Default::default()
            },
            spec: crate::resource::PeeringServerSpec {
                replicas,
                ping_interval,
                port,
                image: "peering-server:latest".to_owned(),
                resources: Default::default(),
            },
            status: None,
        }
    }

    #[test]
    fn peer_list_is_deterministic_and_includes_self() {
        let ps = ps("small", 3, 8080, 60_000);
        let cfg = PeerConfig::for_cohort(&ps, "default");
        assert_eq!(
            cfg.peers,
            vec![
                Peer {
                    host: "small-0.small-headless.default.svc.cluster.local".into(),
                    port: 8080
                },
                Peer {
                    host: "small-1.small-headless.default.svc.cluster.local".into(),
                    port: 8080
                },
                Peer {
                    host: "small-2.small-headless.default.svc.cluster.local".into(),
                    port: 8080
                },
            ]
        );
        assert_eq!(cfg.ping_interval, 60_000);
    }

    #[test]
    fn zero_replicas_yields_empty_peer_list() {
        let ps = ps("solo", 0, 8080, 60_000);
        assert!(PeerConfig::for_cohort(&ps, "default").peers.is_empty());
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = PeerConfig::for_cohort(&ps("small", 2, 9090, 5_000), "ns-a");
        let json = serde_json::to_string(&cfg).unwrap();
        let back: PeerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn parses_well_formed_json_regardless_of_whitespace() {
        let compact = r#"{"peers":[{"host":"a","port":1}],"pingInterval":10}"#;
        let spaced = "{ \"peers\" : [ { \"host\" : \"a\", \"port\" : 1 } ], \"pingInterval\" : 10 }";
        let a: PeerConfig = serde_json::from_str(compact).unwrap();
        let b: PeerConfig = serde_json::from_str(spaced).unwrap();
        assert_eq!(a, b);
    }
}
