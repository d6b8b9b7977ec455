// Test doubles for the dedup engine.
//
// MemoryRecordStore is a stateful in-memory RecordStore with failure
// injection and assertion helpers. FakeOracle returns scripted verdicts so
// sweep behavior is
// deterministic: no network, no database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use conflictwatch_common::{
    record_hash, Casualties, IncidentRecord, IncidentStatus, InsertOutcome, Location, RecordStore,
    SourceRef,
};

use crate::oracle::{BetterReport, DuplicateOracle, OracleVerdict};

// ---------------------------------------------------------------------------
// MemoryRecordStore
// ---------------------------------------------------------------------------

struct MemoryRecordStoreInner {
    records: HashMap<Uuid, IncidentRecord>,
    fail_updates: bool,
    fail_deletes: bool,
}

/// In-memory record store. Thread-safe via interior Mutex.
/// `seed` bypasses the hash guard so tests can stage near-duplicate records
/// the way they actually occur in the wild.
pub struct MemoryRecordStore {
    inner: Mutex<MemoryRecordStoreInner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryRecordStoreInner {
                records: HashMap::new(),
                fail_updates: false,
                fail_deletes: false,
            }),
        }
    }

    /// Make every `update` call return an error.
    pub fn failing_updates(self) -> Self {
        self.inner.lock().unwrap().fail_updates = true;
        self
    }

    /// Make every `delete` call return an error.
    pub fn failing_deletes(self) -> Self {
        self.inner.lock().unwrap().fail_deletes = true;
        self
    }

    /// Stage a record directly, without the insert-time hash guard.
    pub async fn seed(&self, record: IncidentRecord) {
        self.inner.lock().unwrap().records.insert(record.id, record);
    }

    // --- Assertion helpers ---

    pub fn record_count(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.inner.lock().unwrap().records.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<IncidentRecord> {
        self.inner.lock().unwrap().records.get(&id).cloned()
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &IncidentRecord) -> Result<InsertOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if inner.records.values().any(|r| r.hash == record.hash) {
            return Ok(InsertOutcome::DuplicateHash);
        }
        inner.records.insert(record.id, record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<IncidentRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.values().find(|r| r.hash == hash).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<IncidentRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.get(&id).cloned())
    }

    async fn find_by_state(&self, state: &str) -> Result<Vec<IncidentRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut records: Vec<IncidentRecord> = inner
            .records
            .values()
            .filter(|r| r.location.state.eq_ignore_ascii_case(state))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn similar_exists_same_day(
        &self,
        state: &str,
        day: NaiveDate,
        town: &str,
        group: &str,
    ) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.values().any(|r| {
            r.location.state.eq_ignore_ascii_case(state)
                && r.date.date_naive() == day
                && (r.location.town.eq_ignore_ascii_case(town)
                    || r.group.eq_ignore_ascii_case(group))
        }))
    }

    async fn update(&self, record: &IncidentRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_updates {
            bail!("MemoryRecordStore: update forced failure");
        }
        if !inner.records.contains_key(&record.id) {
            bail!("MemoryRecordStore: no record with id {}", record.id);
        }
        inner.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_deletes {
            bail!("MemoryRecordStore: delete forced failure");
        }
        inner.records.remove(&id);
        Ok(())
    }

    async fn add_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.records.get_mut(&id) {
            if !record.tags.iter().any(|t| t == tag) {
                record.tags.push(tag.to_string());
            }
        }
        Ok(())
    }

    async fn states(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        let mut states: Vec<String> = inner
            .records
            .values()
            .map(|r| r.location.state.clone())
            .collect();
        states.sort();
        states.dedup();
        Ok(states)
    }
}

// ---------------------------------------------------------------------------
// FakeOracle
// ---------------------------------------------------------------------------

enum FakeVerdict {
    Duplicate(BetterReport),
    Unique,
    TransportError,
}

/// Scripted oracle. Counts calls so tests can assert on the batch cap.
pub struct FakeOracle {
    verdict: FakeVerdict,
    calls: AtomicUsize,
}

impl FakeOracle {
    /// Confirm every pair as duplicate, with the given quality judgement.
    pub fn confirming(better: BetterReport) -> Self {
        Self {
            verdict: FakeVerdict::Duplicate(better),
            calls: AtomicUsize::new(0),
        }
    }

    /// Judge every pair as distinct events.
    pub fn rejecting() -> Self {
        Self {
            verdict: FakeVerdict::Unique,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every call with a simulated transport error.
    pub fn failing() -> Self {
        Self {
            verdict: FakeVerdict::TransportError,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DuplicateOracle for FakeOracle {
    async fn confirm(
        &self,
        _candidate: &IncidentRecord,
        existing: &[IncidentRecord],
    ) -> Result<OracleVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.verdict {
            FakeVerdict::TransportError => bail!("FakeOracle: simulated transport failure"),
            FakeVerdict::Unique => Ok(OracleVerdict {
                is_duplicate: false,
                duplicate_of_id: None,
                better_report: BetterReport::Candidate,
                reason: "reports describe different events".to_string(),
            }),
            FakeVerdict::Duplicate(better) => Ok(OracleVerdict {
                is_duplicate: true,
                duplicate_of_id: existing.first().map(|r| r.id),
                better_report: better,
                reason: "same location, date, and nature of attack".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------

/// Midnight UTC on the given day.
pub fn day(year: i32, month: u32, dom: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, dom, 0, 0, 0).unwrap()
}

/// A minimal comparable record. Tests mutate fields directly for the
/// scenario at hand.
pub fn incident(state: &str, town: &str, date: DateTime<Utc>) -> IncidentRecord {
    let now = Utc::now();
    let group = "Unknown".to_string();
    IncidentRecord {
        id: Uuid::new_v4(),
        title: format!("Attack in {town}"),
        description: format!("Reported attack in {town}, {state}."),
        date,
        location: Location::new(state, "Unknown", town),
        group: group.clone(),
        casualties: Casualties::default(),
        sources: Vec::new(),
        status: IncidentStatus::Unconfirmed,
        tags: Vec::new(),
        hash: record_hash(date, state, town, &group),
        created_at: now,
        updated_at: now,
    }
}

pub fn source(url: &str) -> SourceRef {
    SourceRef {
        url: url.to_string(),
        title: String::new(),
        publisher: String::new(),
    }
}
