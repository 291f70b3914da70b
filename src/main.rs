use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use tok_poster::web::{router, AppState};
use tok_poster::{ApiClient, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tok_poster=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let addr = config.addr;
    tracing::info!(
        %addr,
        redirect_uri = %config.api.redirect_uri,
        callback_dir = %config.callback_dir.display(),
        seeded = config.seed.is_some(),
        "starting"
    );

    let client = ApiClient::new(config.api.clone());
    let app = router(AppState::new(config, client));

    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("can't bind {addr}"))?;
    axum::serve(listener, app).await.context("server stopped")?;

    Ok(())
}
