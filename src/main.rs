use aicam_relay::{AppError, Configuration, Coordinator};
use tracing::{info, Level};

fn init_logging() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_logging();
    let configuration = Configuration::load()?;
    info!(
        "AI camera relay starting: model={} threshold={}",
        configuration.model, configuration.confidence_threshold
    );

    let coordinator = Coordinator::start(configuration).await?;
    tokio::signal::ctrl_c().await.ok();
    info!("Shutdown signal received");
    coordinator.shutdown().await;
    Ok(())
}
