use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use doc_qa::api;
use doc_qa::config::Config;
use doc_qa::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!(
        "Embeddings: {} {} ({})",
        config.embedding.provider,
        config.embedding.model,
        config.embedding.base_url
    );
    tracing::info!(
        "Generation: {} ({})",
        config.generation.model,
        config.generation.base_url
    );
    if config.generation.api_key.is_none() {
        tracing::warn!("No LLM_API_KEY or GITHUB_TOKEN set; answer generation will likely fail");
    }

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route(
            "/api/documents",
            post(api::documents::ingest).delete(api::documents::clear),
        )
        .route("/api/stats", get(api::documents::stats))
        .route("/api/search", post(api::search::search))
        .route("/api/ask", post(api::ask::ask))
        .route(
            "/api/history",
            get(api::ask::history).delete(api::ask::clear_history),
        )
        .route(
            "/api/settings",
            get(api::settings::get_settings).put(api::settings::update_settings),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
