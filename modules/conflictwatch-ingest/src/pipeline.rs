// Ingestion pipeline: raw extracted reports → guarded inserts.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use conflictwatch_common::{
    record_hash, Casualties, IncidentRecord, IncidentStatus, InsertOutcome, Location, RecordStore,
    SourceRef, MAX_TEXT_CHARS, MAX_TITLE_CHARS,
};

use crate::extractor::{IncidentExtractor, RawIncident};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub processed: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub errors: usize,
}

impl fmt::Display for IngestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} saved={} duplicates={} errors={}",
            self.processed, self.saved, self.duplicates, self.errors
        )
    }
}

enum StoreOutcome {
    Saved,
    Duplicate,
}

pub struct IngestPipeline {
    store: Arc<dyn RecordStore>,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Fetch recent reports and store the new ones. Per-report failures are
    /// counted, not propagated; an extraction failure aborts the run.
    pub async fn run(&self, extractor: &dyn IncidentExtractor) -> Result<IngestStats> {
        let raw = extractor.fetch_recent().await?;

        let mut stats = IngestStats {
            processed: raw.len(),
            ..IngestStats::default()
        };

        for incident in raw {
            let title = incident.title.clone();
            match self.store_one(incident).await {
                Ok(StoreOutcome::Saved) => {
                    stats.saved += 1;
                    info!(title = %title, "Saved incident");
                }
                Ok(StoreOutcome::Duplicate) => {
                    stats.duplicates += 1;
                    debug!(title = %title, "Skipped duplicate incident");
                }
                Err(e) => {
                    stats.errors += 1;
                    warn!(title = %title, error = %e, "Failed to store incident");
                }
            }
        }

        info!(%stats, "Ingest run complete");
        Ok(stats)
    }

    async fn store_one(&self, raw: RawIncident) -> Result<StoreOutcome> {
        let record = to_record(raw)?;

        // Fast guard: exact content fingerprint.
        if self.store.find_by_hash(&record.hash).await?.is_some() {
            return Ok(StoreOutcome::Duplicate);
        }

        // Second guard: a same-day report in the same state with the same
        // town or the same group is close enough to defer to the sweep.
        let similar = self
            .store
            .similar_exists_same_day(
                &record.location.state,
                record.date.date_naive(),
                &record.location.town,
                &record.group,
            )
            .await?;
        if similar {
            return Ok(StoreOutcome::Duplicate);
        }

        // A concurrent ingest may still win the race; the insert itself is
        // hash-guarded and losing it is a duplicate, not an error.
        match self.store.insert(&record).await? {
            InsertOutcome::Inserted => Ok(StoreOutcome::Saved),
            InsertOutcome::DuplicateHash => Ok(StoreOutcome::Duplicate),
        }
    }
}

/// Sanitize a model-provided string: strip `$`/`{`/`}` and control
/// characters, trim, cap the length.
pub fn sanitize(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| !matches!(c, '$' | '{' | '}') && !c.is_control())
        .collect();
    cleaned.trim().chars().take(MAX_TEXT_CHARS).collect()
}

fn sanitize_capped(input: &str, cap: usize) -> String {
    sanitize(input).chars().take(cap).collect()
}

fn or_unknown(value: String) -> String {
    if value.is_empty() {
        "Unknown".to_string()
    } else {
        value
    }
}

fn to_record(raw: RawIncident) -> Result<IncidentRecord> {
    let date = DateTime::parse_from_rfc3339(&raw.date)
        .with_context(|| format!("unparseable incident date: {}", raw.date))?
        .with_timezone(&Utc);

    let state = sanitize(&raw.location.state);
    let town = or_unknown(sanitize(&raw.location.town));
    let lga = or_unknown(sanitize(&raw.location.lga));
    let group = sanitize(&raw.group);

    let now = Utc::now();
    Ok(IncidentRecord {
        id: Uuid::new_v4(),
        title: sanitize_capped(&raw.title, MAX_TITLE_CHARS),
        description: sanitize(&raw.description),
        date,
        hash: record_hash(date, &state, &town, &group),
        location: Location::new(state, lga, town),
        group,
        casualties: Casualties {
            killed: raw.casualties.killed,
            injured: raw.casualties.injured,
            kidnapped: raw.casualties.kidnapped,
            displaced: raw.casualties.displaced,
        },
        sources: raw
            .sources
            .into_iter()
            .map(|s| SourceRef {
                url: sanitize(&s.url),
                title: sanitize(&s.title),
                publisher: sanitize(&s.publisher),
            })
            .collect(),
        status: raw.status.parse().unwrap_or(IncidentStatus::Unconfirmed),
        tags: raw.tags.iter().map(|t| sanitize(t)).collect(),
        created_at: now,
        updated_at: now,
    })
}
