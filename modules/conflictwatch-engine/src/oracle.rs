// DuplicateOracle, the external semantic-comparison seam.
//
// The engine only consumes the three structured verdict fields; it never
// interprets the oracle's reasoning. A transport or parse failure surfaces
// as Err and the sweep records it as a Failed outcome, never a merge.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use conflictwatch_common::IncidentRecord;

/// Which of the two compared reports is the higher-quality one: more
/// specific, better corroborated, more plausible casualty figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetterReport {
    Candidate,
    Existing,
}

#[derive(Debug, Clone)]
pub struct OracleVerdict {
    pub is_duplicate: bool,
    /// Id of the existing report the candidate duplicates, when known.
    pub duplicate_of_id: Option<Uuid>,
    pub better_report: BetterReport,
    pub reason: String,
}

#[async_trait]
pub trait DuplicateOracle: Send + Sync {
    /// Final same/different judgement for one candidate report against a
    /// short list of existing reports.
    async fn confirm(
        &self,
        candidate: &IncidentRecord,
        existing: &[IncidentRecord],
    ) -> Result<OracleVerdict>;
}
