use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tag applied to records that a duplicate sweep has already examined.
/// Pairs where both records carry it are skipped on later sweeps.
pub const CHECKED_DUPLICATE_TAG: &str = "checked_duplicate";

/// Maximum stored length for titles.
pub const MAX_TITLE_CHARS: usize = 500;
/// Maximum stored length for descriptions and other free text.
pub const MAX_TEXT_CHARS: usize = 5000;

// --- Location ---

/// Administrative region hierarchy. `state` is the partition key for
/// duplicate comparison; records in different states are never compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub state: String,
    pub lga: String,
    pub town: String,
}

impl Location {
    pub fn new(state: impl Into<String>, lga: impl Into<String>, town: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            lga: lga.into(),
            town: town.into(),
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self {
            state: String::new(),
            lga: "Unknown".to_string(),
            town: "Unknown".to_string(),
        }
    }
}

// --- Casualties ---

/// Reported casualty counts. `None` means "not reported", which is distinct
/// from a reported zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Casualties {
    pub killed: Option<u32>,
    pub injured: Option<u32>,
    pub kidnapped: Option<u32>,
    pub displaced: Option<u32>,
}

// --- Sources ---

/// A published report backing an incident record. Deduplicated by `url`
/// within a record's source list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub publisher: String,
}

// --- Status ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Confirmed,
    Unconfirmed,
    Developing,
}

impl IncidentStatus {
    /// Corroboration strength: confirmed > developing > unconfirmed.
    pub fn corroboration_rank(self) -> u8 {
        match self {
            IncidentStatus::Confirmed => 2,
            IncidentStatus::Developing => 1,
            IncidentStatus::Unconfirmed => 0,
        }
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncidentStatus::Confirmed => write!(f, "confirmed"),
            IncidentStatus::Unconfirmed => write!(f, "unconfirmed"),
            IncidentStatus::Developing => write!(f, "developing"),
        }
    }
}

impl std::str::FromStr for IncidentStatus {
    type Err = crate::ConflictWatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(IncidentStatus::Confirmed),
            "unconfirmed" => Ok(IncidentStatus::Unconfirmed),
            "developing" => Ok(IncidentStatus::Developing),
            other => Err(crate::ConflictWatchError::Validation(format!(
                "unknown incident status: {other}"
            ))),
        }
    }
}

// --- Incident record ---

/// The canonical unit: one real-world security incident as currently known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: Location,
    /// Attributed responsible actor. May be generic ("Unknown Gunmen").
    pub group: String,
    pub casualties: Casualties,
    pub sources: Vec<SourceRef>,
    pub status: IncidentStatus,
    pub tags: Vec<String>,
    /// Content fingerprint over (day, state, town, group). Unique at write time.
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IncidentRecord {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// A record without a state cannot be windowed or compared; the sweep
    /// excludes it instead of failing.
    pub fn is_comparable(&self) -> bool {
        !self.location.state.trim().is_empty()
    }

    /// Recompute the fingerprint from the current identity fields.
    pub fn compute_hash(&self) -> String {
        record_hash(
            self.date,
            &self.location.state,
            &self.location.town,
            &self.group,
        )
    }
}

/// Stable content fingerprint: sha256 over day-level date plus normalized
/// state, town, and group. The fast exact-duplicate guard at ingestion time.
pub fn record_hash(date: DateTime<Utc>, state: &str, town: &str, group: &str) -> String {
    use sha2::{Digest, Sha256};

    let input = format!(
        "{}|{}|{}|{}",
        date.format("%Y-%m-%d"),
        state.trim().to_lowercase(),
        town.trim().to_lowercase(),
        group.trim().to_lowercase(),
    );
    hex::encode(Sha256::digest(input.as_bytes()))
}
