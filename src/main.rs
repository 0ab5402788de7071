use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod apis;
mod config;
mod enrich;
mod llm;
mod search;
mod server;

use config::Config;
use llm::OpenAiTransformer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let sources = config.build_sources();
    tracing::info!(
        "initialized {} article sources, model={}",
        sources.len(),
        config.openai_model
    );

    let transformer = OpenAiTransformer::new(
        config.openai_base_url.clone(),
        config.openai_api_key.clone(),
        config.openai_model.clone(),
    );

    let addr = config.addr;
    let state = server::AppState {
        config: Arc::new(config),
        sources: Arc::new(sources),
        transformer: Arc::new(transformer),
    };

    let app = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
