// ============================
// relay-bin/src/main.rs
// ============================
use anyhow::Result;
use relay_lib::{config::Settings, emotes::EmoteTable, ws, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    let emotes = EmoteTable::load(&settings.emotes_file);
    let addr = settings.bind_addr;
    let state = Arc::new(AppState::new(settings, emotes));
    let app = ws::create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "chat relay listening");

    axum::serve(listener, app).await?;

    Ok(())
}
