// RecordStore, the persistence seam for incident records.
//
// The engine and the ingestion pipeline both talk to the store through this
// trait only. Production uses the Postgres implementation in
// conflictwatch-store; tests use the in-memory store in
// conflictwatch-engine's testing module.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::types::IncidentRecord;

/// Result of a hash-guarded insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same content fingerprint already exists;
    /// the insert was rejected.
    DuplicateHash,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record unless its `hash` is already present.
    async fn insert(&self, record: &IncidentRecord) -> Result<InsertOutcome>;

    /// Look up a record by content fingerprint.
    async fn find_by_hash(&self, hash: &str) -> Result<Option<IncidentRecord>>;

    /// Look up a record by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<IncidentRecord>>;

    /// All records for a state (case-insensitive exact match),
    /// sorted ascending by date.
    async fn find_by_state(&self, state: &str) -> Result<Vec<IncidentRecord>>;

    /// Ingestion second guard: does a record exist in this state on this day
    /// whose town or group matches (case-insensitive)?
    async fn similar_exists_same_day(
        &self,
        state: &str,
        day: NaiveDate,
        town: &str,
        group: &str,
    ) -> Result<bool>;

    /// Overwrite a record's mutable fields by id.
    async fn update(&self, record: &IncidentRecord) -> Result<()>;

    /// Remove a record entirely.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Add a tag to a record if not already present.
    async fn add_tag(&self, id: Uuid, tag: &str) -> Result<()>;

    /// Distinct states that currently have records, for sweep scheduling.
    async fn states(&self) -> Result<Vec<String>>;
}
