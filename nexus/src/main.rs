use std::time::Duration;

use clap::Parser;

use args::Args;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init(&args);

    std::fs::create_dir_all(&args.data_dir)?;

    let config = config::Config::load(&args.config_file)?;
    let listen_address = config.server.listen_address;

    let telemetry_guard = telemetry::init(&config.telemetry).await?;

    let state = llm::AppState::new(config);
    let cooldown = state.dispatcher.cooldown.clone();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(cooldown.run_sweeper(Duration::from_secs(30), shutdown_rx));

    let app = llm::app(state);
    let listener = tokio::net::TcpListener::bind(listen_address).await?;
    log::info!("listening on {listen_address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    telemetry_guard.force_flush().ok();
    fastrace::flush();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    log::info!("shutdown signal received, draining in-flight requests");
}
