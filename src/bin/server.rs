// The Managed Server: one HTTP endpoint process per pod.
use std::sync::Arc;

use peering_operator::server::{self, http, ping, watch, ServerState};
use tokio::sync::watch as watch_channel;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "peering_operator=info,warp=info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let config_path = server::config_path();
    let port = server::port();
    let server_name = server::server_name();

    let initial = server::load_config(&config_path).await;
    tracing::info!(
        "{}: loaded initial config ({} peers, pingInterval={}ms)",
        server_name,
        initial.peers.len(),
        initial.ping_interval
    );

    let state = Arc::new(ServerState::new(server_name, initial));
    let shutdown = CancellationToken::new();
    let (reload_tx, reload_rx) = watch_channel::channel(());

    // Keep the debouncer alive for the lifetime of the process; dropping it stops
    // the underlying OS watch.
    let _debouncer = watch::spawn(&config_path, state.clone(), reload_tx)?;

    let http_client = reqwest::Client::builder().build()?;
    let ping_task = tokio::spawn(ping::run(
        state.clone(),
        http_client,
        reload_rx,
        shutdown.clone(),
    ));

    let routes = http::routes(state);
    let shutdown_signal = shutdown.clone();
    let (addr, serving) = warp::serve(routes).bind_with_graceful_shutdown(
        ([0, 0, 0, 0], port),
        async move { shutdown_signal.cancelled().await },
    );
    tracing::info!("listening on {}", addr);
    let http_task = tokio::spawn(serving);

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining");
    shutdown.cancel();

    let _ = ping_task.await;
    let _ = http_task.await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
