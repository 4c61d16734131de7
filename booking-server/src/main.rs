use anyhow::Context;
use booking_server::build_app;
use booking_server::config::ServerConfig;
use clap::Parser;
use log::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("=== Booking Server Starting ===");

    let config = ServerConfig::parse();

    // 1. Data directory
    tokio::fs::create_dir_all(config.data_dir())
        .await
        .with_context(|| format!("creating data dir {}", config.data_dir().display()))?;

    // 2. Routes
    let app = build_app(&config)?;

    // 3. Serve
    let addr = config.bind_addr();
    info!("Booking Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Booking Server shutting down");
        })
        .await?;

    Ok(())
}
