use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use conflictwatch_common::{IncidentRecord, RecordStore, CHECKED_DUPLICATE_TAG};

use crate::candidates::{DedupConfig, DuplicateCandidate};
use crate::merge::merge_records;
use crate::oracle::{BetterReport, DuplicateOracle};

/// Terminal state of one candidate pair within a run. No retries, no
/// backward transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepAction {
    Merged { kept: Uuid, absorbed: Uuid },
    Rejected { reason: String },
    Failed { error: String },
    SkippedRetired,
}

#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub record_a: Uuid,
    pub record_b: Uuid,
    pub score: f64,
    pub action: SweepAction,
}

/// Processes candidate pairs sequentially in score order: asks the oracle,
/// merges confirmed duplicates, retires absorbed records.
///
/// Sequential on purpose: each merge deletes a record that later pairs may
/// reference, which the per-run retirement set handles. Stopping after any
/// completed pair leaves the store fully consistent, so the run is
/// interruptible between pairs.
pub struct SweepRunner {
    store: Arc<dyn RecordStore>,
    oracle: Arc<dyn DuplicateOracle>,
    config: DedupConfig,
}

impl SweepRunner {
    pub fn new(
        store: Arc<dyn RecordStore>,
        oracle: Arc<dyn DuplicateOracle>,
        config: DedupConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            config,
        }
    }

    /// Process a candidate list. Per-pair failures become outcomes, never
    /// aborts; running out of time budget is a successful partial run.
    pub async fn run(&self, mut candidates: Vec<DuplicateCandidate>) -> Vec<SweepOutcome> {
        // Most confident pairs first: under the batch cap and time budget,
        // the obvious merges must not lose their slot to marginal ones.
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(self.config.max_pairs_per_run);

        let started = Instant::now();
        let mut retired: HashSet<Uuid> = HashSet::new();
        let mut outcomes = Vec::new();

        for candidate in candidates {
            if let Some(budget) = self.config.time_budget {
                if started.elapsed() >= budget {
                    info!(
                        processed = outcomes.len(),
                        "Sweep time budget exhausted, stopping between pairs"
                    );
                    break;
                }
            }

            let a = candidate.record_a.id;
            let b = candidate.record_b.id;

            let action = if retired.contains(&a) || retired.contains(&b) {
                SweepAction::SkippedRetired
            } else {
                self.process_pair(&candidate, &mut retired).await
            };

            outcomes.push(SweepOutcome {
                record_a: a,
                record_b: b,
                score: candidate.score,
                action,
            });
        }

        outcomes
    }

    async fn process_pair(
        &self,
        candidate: &DuplicateCandidate,
        retired: &mut HashSet<Uuid>,
    ) -> SweepAction {
        // The candidate carries snapshots from generation time, but an
        // earlier merge in this run may already have rewritten one of the
        // records. Merging from a stale snapshot would overwrite what that
        // merge absorbed, so both sides are re-read before any judgement.
        let (record_a, record_b) = match self
            .fetch_pair(candidate.record_a.id, candidate.record_b.id)
            .await
        {
            Ok(Some(pair)) => pair,
            Ok(None) => return SweepAction::SkippedRetired,
            Err(e) => {
                return SweepAction::Failed {
                    error: format!("pair reload failed: {e}"),
                }
            }
        };

        // The oracle contract is candidate-vs-existing; record_a plays the
        // candidate, record_b the existing report.
        let verdict = match self
            .oracle
            .confirm(&record_a, std::slice::from_ref(&record_b))
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    record_a = %record_a.id,
                    record_b = %record_b.id,
                    error = %e,
                    "Oracle check failed for pair"
                );
                return SweepAction::Failed {
                    error: e.to_string(),
                };
            }
        };

        if !verdict.is_duplicate {
            // Remember the verdict so later sweeps skip this pair.
            for id in [record_a.id, record_b.id] {
                if let Err(e) = self.store.add_tag(id, CHECKED_DUPLICATE_TAG).await {
                    warn!(id = %id, error = %e, "Failed to tag checked record");
                }
            }
            return SweepAction::Rejected {
                reason: verdict.reason,
            };
        }

        let (primary, secondary) = match verdict.better_report {
            BetterReport::Existing => (&record_b, &record_a),
            BetterReport::Candidate => (&record_a, &record_b),
        };

        let merged = merge_records(primary, secondary);

        // Update first, delete second: if the delete fails after a
        // successful update we are left with two complete records, not a
        // half-merged one. The next sweep picks the pair up again.
        if let Err(e) = self.store.update(&merged).await {
            warn!(id = %primary.id, error = %e, "Merge update failed, keeping both records");
            return SweepAction::Failed {
                error: format!("merge update failed: {e}"),
            };
        }

        // The secondary's information now lives in the primary; no later
        // pair in this run may touch it, deleted or not.
        retired.insert(secondary.id);

        if let Err(e) = self.store.delete(secondary.id).await {
            warn!(
                id = %secondary.id,
                error = %e,
                "Failed to delete absorbed record; next sweep retries"
            );
            return SweepAction::Failed {
                error: format!("delete failed: {e}"),
            };
        }

        info!(
            kept = %primary.id,
            absorbed = %secondary.id,
            score = candidate.score,
            reason = %verdict.reason,
            "Merged duplicate incident reports"
        );

        SweepAction::Merged {
            kept: primary.id,
            absorbed: secondary.id,
        }
    }

    /// Current store state for both records, or `None` when either has
    /// gone away since candidate generation.
    async fn fetch_pair(
        &self,
        a: Uuid,
        b: Uuid,
    ) -> anyhow::Result<Option<(IncidentRecord, IncidentRecord)>> {
        let record_a = self.store.find_by_id(a).await?;
        let record_b = self.store.find_by_id(b).await?;
        Ok(record_a.zip(record_b))
    }
}
