use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use conflictwatch_common::{
    Casualties, IncidentRecord, IncidentStatus, InsertOutcome, Location, RecordStore, SourceRef,
};

/// Row from the `incidents` table. The responsible actor column is
/// `group_name` because `group` is a SQL keyword.
#[derive(Debug, sqlx::FromRow)]
struct IncidentRow {
    id: Uuid,
    title: String,
    description: String,
    date: DateTime<Utc>,
    state: String,
    lga: String,
    town: String,
    group_name: String,
    killed: Option<i32>,
    injured: Option<i32>,
    kidnapped: Option<i32>,
    displaced: Option<i32>,
    sources: serde_json::Value,
    status: String,
    tags: Vec<String>,
    hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str = r#"
    id, title, description, date, state, lga, town, group_name,
    killed, injured, kidnapped, displaced,
    sources, status, tags, hash, created_at, updated_at
"#;

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("incidents schema migration failed")?;
        Ok(())
    }

    /// Try to take the per-state sweep lock. `None` means another sweep
    /// holds it; the caller should skip the state, not wait.
    pub async fn try_sweep_lock(&self, state: &str) -> Result<Option<SweepLock>> {
        let mut conn = self.pool.acquire().await?;
        let key = sweep_lock_key(state);
        let locked: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(conn.as_mut())
            .await?;
        if locked {
            Ok(Some(SweepLock { conn, key }))
        } else {
            Ok(None)
        }
    }
}

/// A held per-state advisory lock. Advisory locks are session-scoped, so the
/// guard pins the pool connection it was taken on. Dropping the guard
/// returns the connection and the lock with it.
pub struct SweepLock {
    conn: PoolConnection<Postgres>,
    key: i64,
}

impl SweepLock {
    /// Release explicitly instead of waiting for the connection to close.
    pub async fn release(mut self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .execute(self.conn.as_mut())
            .await?;
        Ok(())
    }
}

/// Stable advisory-lock key for a state, case-insensitive.
fn sweep_lock_key(state: &str) -> i64 {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(format!("sweep:{}", state.trim().to_lowercase()).as_bytes());
    let mut key = [0u8; 8];
    key.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(key)
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert(&self, record: &IncidentRecord) -> Result<InsertOutcome> {
        let sources = serde_json::to_value(&record.sources)?;
        let result = sqlx::query(
            r#"
            INSERT INTO incidents
                (id, title, description, date, state, lga, town, group_name,
                 killed, injured, kidnapped, displaced,
                 sources, status, tags, hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                    $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (hash) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.date)
        .bind(&record.location.state)
        .bind(&record.location.lga)
        .bind(&record.location.town)
        .bind(&record.group)
        .bind(record.casualties.killed.map(|v| v as i32))
        .bind(record.casualties.injured.map(|v| v as i32))
        .bind(record.casualties.kidnapped.map(|v| v as i32))
        .bind(record.casualties.displaced.map(|v| v as i32))
        .bind(sources)
        .bind(record.status.to_string())
        .bind(&record.tags)
        .bind(&record.hash)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::DuplicateHash)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<IncidentRecord>> {
        let row = sqlx::query_as::<_, IncidentRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM incidents WHERE hash = $1"
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<IncidentRecord>> {
        let row = sqlx::query_as::<_, IncidentRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM incidents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    async fn find_by_state(&self, state: &str) -> Result<Vec<IncidentRecord>> {
        let rows = sqlx::query_as::<_, IncidentRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM incidents
            WHERE lower(state) = lower($1)
            ORDER BY date ASC, id ASC
            "#
        ))
        .bind(state)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn similar_exists_same_day(
        &self,
        state: &str,
        day: NaiveDate,
        town: &str,
        group: &str,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM incidents
                WHERE lower(state) = lower($1)
                  AND (date AT TIME ZONE 'UTC')::date = $2
                  AND (lower(town) = lower($3) OR lower(group_name) = lower($4))
            )
            "#,
        )
        .bind(state)
        .bind(day)
        .bind(town)
        .bind(group)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn update(&self, record: &IncidentRecord) -> Result<()> {
        let sources = serde_json::to_value(&record.sources)?;
        let result = sqlx::query(
            r#"
            UPDATE incidents SET
                title = $2, description = $3, date = $4,
                state = $5, lga = $6, town = $7, group_name = $8,
                killed = $9, injured = $10, kidnapped = $11, displaced = $12,
                sources = $13, status = $14, tags = $15, hash = $16,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.date)
        .bind(&record.location.state)
        .bind(&record.location.lga)
        .bind(&record.location.town)
        .bind(&record.group)
        .bind(record.casualties.killed.map(|v| v as i32))
        .bind(record.casualties.injured.map(|v| v as i32))
        .bind(record.casualties.kidnapped.map(|v| v as i32))
        .bind(record.casualties.displaced.map(|v| v as i32))
        .bind(sources)
        .bind(record.status.to_string())
        .bind(&record.tags)
        .bind(&record.hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("no incident with id {}", record.id);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM incidents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE incidents
            SET tags = array_append(tags, $2), updated_at = now()
            WHERE id = $1 AND NOT ($2 = ANY(tags))
            "#,
        )
        .bind(id)
        .bind(tag)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn states(&self) -> Result<Vec<String>> {
        let states = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT state FROM incidents ORDER BY state",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(states)
    }
}

fn row_to_record(row: IncidentRow) -> Result<IncidentRecord> {
    let status: IncidentStatus = row.status.parse()?;
    let sources: Vec<SourceRef> = serde_json::from_value(row.sources)
        .with_context(|| format!("malformed sources for incident {}", row.id))?;

    Ok(IncidentRecord {
        id: row.id,
        title: row.title,
        description: row.description,
        date: row.date,
        location: Location::new(row.state, row.lga, row.town),
        group: row.group_name,
        casualties: Casualties {
            killed: row.killed.and_then(|v| u32::try_from(v).ok()),
            injured: row.injured.and_then(|v| u32::try_from(v).ok()),
            kidnapped: row.kidnapped.and_then(|v| u32::try_from(v).ok()),
            displaced: row.displaced.and_then(|v| u32::try_from(v).ok()),
        },
        sources,
        status,
        tags: row.tags,
        hash: row.hash,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
