use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use conflictwatch_common::Config;
use conflictwatch_ingest::{GeminiExtractor, IngestPipeline};
use conflictwatch_store::PgRecordStore;
use gemini_client::GeminiClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("conflictwatch_ingest=info".parse()?)
                .add_directive("conflictwatch_engine=info".parse()?)
                .add_directive("conflictwatch_store=info".parse()?),
        )
        .init();

    info!("ConflictWatch ingest starting...");

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgRecordStore::new(pool));
    store.migrate().await?;

    let client = GeminiClient::new(&config.gemini_api_key, &config.gemini_model);
    let extractor = GeminiExtractor::new(client);

    let pipeline = IngestPipeline::new(store);
    let stats = pipeline.run(&extractor).await?;

    info!(%stats, "Ingest finished");
    Ok(())
}
