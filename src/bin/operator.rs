// Starts the Watch Engine + Reconciler.
use kube::Client;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "peering_operator=info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let namespace = std::env::var("WATCH_NAMESPACE").unwrap_or_else(|_| "default".to_owned());
    let client = Client::try_default().await?;

    tracing::info!("starting peering-operator, watching namespace {}", namespace);
    peering_operator::run(client, namespace).await;
    Ok(())
}
