//! The Managed Server's HTTP surface. All responses are plain text except
//! `/config`, which is JSON and debug-only.
use std::{convert::Infallible, sync::Arc};

use serde::Serialize;
use warp::{Filter, Rejection, Reply};

use crate::wire::PeerConfig;

use super::ServerState;

#[must_use]
pub fn routes(state: Arc<ServerState>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    health().or(ping()).or(config(state))
}

// GET /health
fn health() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::get()
        .and(warp::path("health"))
        .and(warp::path::end())
        .map(|| "ok")
}

// GET /ping
fn ping() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::get()
        .and(warp::path("ping"))
        .and(warp::path::end())
        .map(|| "pong")
}

// GET /config
fn config(state: Arc<ServerState>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::get()
        .and(warp::path("config"))
        .and(warp::path::end())
        .and(with_state(state))
        .map(|state: Arc<ServerState>| {
            warp::reply::json(&ConfigResponse {
                server_name: state.server_name.clone(),
                config: (**state.config.load()).clone(),
            })
        })
}

fn with_state(
    state: Arc<ServerState>,
) -> impl Filter<Extract = (Arc<ServerState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigResponse {
    server_name: String,
    config: PeerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::PeerConfig;

    fn state() -> Arc<ServerState> {
        Arc::new(ServerState::new("pod-0".into(), PeerConfig::empty(1000)))
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let resp = warp::test::request()
            .path("/health")
            .reply(&routes(state()))
            .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body(), "ok");
    }

    #[tokio::test]
    async fn ping_returns_pong() {
        let resp = warp::test::request()
            .path("/ping")
            .reply(&routes(state()))
            .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body(), "pong");
    }

    #[tokio::test]
    async fn config_returns_server_name_and_live_config() {
        let resp = warp::test::request()
            .path("/config")
            .reply(&routes(state()))
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["serverName"], "pod-0");
        assert_eq!(body["config"]["pingInterval"], 1000);
    }
}
