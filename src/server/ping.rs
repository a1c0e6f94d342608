//! The ping schedule: one recurring timer, restarted whenever the config reloads,
//! that pings every peer concurrently with independent failure handling.
use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::wire::Peer;

use super::ServerState;

const PER_PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs until `shutdown` is cancelled. Each iteration re-reads the live config, so a
/// reload both updates the peer list and (via `reload_rx`) restarts the interval.
pub async fn run(
    state: Arc<ServerState>,
    http: reqwest::Client,
    mut reload_rx: watch::Receiver<()>,
    shutdown: CancellationToken,
) {
    loop {
        let config = state.config.load_full();
        let interval = Duration::from_millis(config.ping_interval.max(1) as u64);

        tokio::select! {
            () = shutdown.cancelled() => {
                info!("ping scheduler shutting down");
                return;
            }
            Ok(()) = reload_rx.changed() => {
                debug!("config reloaded, restarting ping schedule");
                continue;
            }
            () = tokio::time::sleep(interval) => {
                let config = state.config.load_full();
                tick(&http, &config.peers).await;
            }
        }
    }
}

/// Pings every peer concurrently. One peer's failure never prevents or cancels
/// another's: each ping is independently awaited to completion via `join_all`.
async fn tick(http: &reqwest::Client, peers: &[Peer]) {
    futures::future::join_all(peers.iter().map(|peer| ping_one(http, peer))).await;
}

async fn ping_one(http: &reqwest::Client, peer: &Peer) {
    let url = format!("http://{}:{}/ping", peer.host, peer.port);
    match http.get(&url).timeout(PER_PEER_TIMEOUT).send().await {
        Ok(resp) if resp.status().is_success() => {
            info!("ping {} ok ({})", url, resp.status());
        }
        Ok(resp) => {
            warn!("ping {} returned non-success status {}", url, resp.status());
        }
        Err(e) if e.is_timeout() => {
            warn!("ping {} timed out after {:?}", url, PER_PEER_TIMEOUT);
        }
        Err(e) if e.is_connect() => {
            warn!("ping {} connection refused: {}", url, e);
        }
        Err(e) => {
            error!("ping {} failed: {}", url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::PeerConfig;

    #[tokio::test]
    async fn tick_completes_even_when_every_peer_is_unreachable() {
        // Ports in the ephemeral range with nothing listening refuse the connection
        // immediately, so this resolves quickly without needing a mock server.
        let peers = vec![
            Peer { host: "127.0.0.1".into(), port: 1 },
            Peer { host: "127.0.0.1".into(), port: 2 },
        ];
        let http = reqwest::Client::new();
        tick(&http, &peers).await;
    }

    #[test]
    fn state_config_swap_is_observed_by_next_load() {
        let state = ServerState::new("pod-0".into(), PeerConfig::empty(1000));
        assert_eq!(state.config.load().ping_interval, 1000);
        state.config.store(Arc::new(PeerConfig::empty(5000)));
        assert_eq!(state.config.load().ping_interval, 5000);
    }
}
