//! Duplicate sweep entry point: per-state candidate generation, oracle
//! confirmation, and lossless merging, under a per-state advisory lock.

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use conflictwatch_common::{Config, RecordStore};
use conflictwatch_engine::{CandidateGenerator, DedupConfig, SweepAction, SweepRunner};
use conflictwatch_ingest::GeminiOracle;
use conflictwatch_store::PgRecordStore;
use gemini_client::GeminiClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("sweep=info".parse()?)
                .add_directive("conflictwatch_engine=info".parse()?)
                .add_directive("conflictwatch_store=info".parse()?),
        )
        .init();

    info!("ConflictWatch sweep starting...");

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgRecordStore::new(pool));
    store.migrate().await?;

    let dedup = DedupConfig::from_config(&config);
    let client = GeminiClient::new(&config.gemini_api_key, &config.gemini_model);
    let oracle = Arc::new(GeminiOracle::new(client));

    let record_store: Arc<dyn RecordStore> = store.clone();
    let generator = CandidateGenerator::new(record_store.clone(), dedup.clone());
    let runner = SweepRunner::new(record_store.clone(), oracle, dedup);

    let states = record_store.states().await?;
    info!(states = states.len(), "Sweeping states for duplicates");

    let mut merged = 0usize;
    let mut rejected = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;

    for state in states {
        let Some(lock) = store.try_sweep_lock(&state).await? else {
            warn!(state = %state, "Another sweep holds the lock, skipping state");
            continue;
        };

        match generator.find_candidates(&state).await {
            Ok(candidates) => {
                let outcomes = runner.run(candidates).await;
                for outcome in &outcomes {
                    match outcome.action {
                        SweepAction::Merged { .. } => merged += 1,
                        SweepAction::Rejected { .. } => rejected += 1,
                        SweepAction::Failed { .. } => failed += 1,
                        SweepAction::SkippedRetired => skipped += 1,
                    }
                }
                info!(state = %state, pairs = outcomes.len(), "State sweep complete");
            }
            Err(e) => {
                error!(state = %state, error = %e, "Candidate generation failed for state");
                failed += 1;
            }
        }

        if let Err(e) = lock.release().await {
            warn!(state = %state, error = %e, "Failed to release sweep lock");
        }
    }

    info!(merged, rejected, failed, skipped, "Sweep finished");
    Ok(())
}
