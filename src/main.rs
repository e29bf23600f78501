use habit_tracker::coach::{Coach, GeminiClient};
use habit_tracker::{AppState, Config, load_data, router};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    if let Some(parent) = config.data_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let coach = match &config.gemini_api_key {
        Some(key) => {
            let mut client = GeminiClient::new(key.clone(), config.gemini_model.clone())?;
            if let Some(base_url) = &config.gemini_base_url {
                client = client.with_base_url(base_url.clone());
            }
            info!(model = %config.gemini_model, "coach messages enabled");
            Coach::new(Arc::new(client))
        }
        None => {
            warn!("GEMINI_API_KEY not set; coach messages disabled");
            Coach::disabled()
        }
    };

    let data = load_data(&config.data_path).await;
    let state = AppState::new(config.data_path.clone(), data, coach);
    let app = router(state);

    let addr = config.addr();
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
