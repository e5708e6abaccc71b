use depot_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (database, storage, services, routes)
    let app = depot_api::setup::initialize_app(config.clone()).await?;

    // Serve until a shutdown signal, then stop background jobs
    depot_api::setup::server::start_server(&config, app.router).await?;
    app.scheduler.shutdown().await;

    Ok(())
}
