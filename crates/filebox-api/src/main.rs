use filebox_api::setup;
use filebox_core::Config;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    filebox_infra::init_telemetry(env!("CARGO_PKG_NAME"), config.is_production())?;
    tracing::info!(
        environment = %config.environment,
        backend = %config.storage_backend,
        "Configuration loaded and validated successfully"
    );

    // Cancelled on shutdown; stops any storage initialization still in flight
    let shutdown = CancellationToken::new();

    let app = setup::initialize_app(config.clone(), shutdown.clone()).await?;

    setup::server::start_server(&config, app.router, shutdown).await?;

    tracing::info!("Server stopped");
    Ok(())
}
