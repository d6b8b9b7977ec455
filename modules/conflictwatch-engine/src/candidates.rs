use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use conflictwatch_common::{Config, IncidentRecord, RecordStore, CHECKED_DUPLICATE_TAG};

use crate::similarity::similarity;

/// Group attributions that carry no discriminating information. A generic
/// attribution on either side must not block a match.
const GENERIC_GROUP_MARKERS: [&str; 3] = ["unknown", "gunmen", "unidentified"];

/// Tunable scoring knobs. The defaults are the deployed values; treat them
/// as configuration, not constants.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Sliding-window width in days. Pairs further apart are never compared.
    pub date_window_days: i64,
    /// Town/LGA similarity above this counts as a location match.
    pub location_threshold: f64,
    /// Title similarity fallback threshold when towns disagree.
    pub title_threshold: f64,
    /// Group-name similarity above this counts as the same actor.
    pub group_threshold: f64,
    /// Killed-count ratio above this counts as agreeing reports.
    pub casualty_agreement: f64,
    /// Minimum aggregate score to emit a candidate at all.
    pub accept_threshold: f64,
    /// Cap on oracle calls per sweep run.
    pub max_pairs_per_run: usize,
    /// Optional wall-clock budget for one sweep run. The runner stops
    /// cleanly between pairs once it elapses.
    pub time_budget: Option<Duration>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            date_window_days: 3,
            location_threshold: 0.8,
            title_threshold: 0.6,
            group_threshold: 0.7,
            casualty_agreement: 0.7,
            accept_threshold: 0.6,
            max_pairs_per_run: 20,
            time_budget: None,
        }
    }
}

impl DedupConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            date_window_days: config.sweep_window_days,
            max_pairs_per_run: config.sweep_max_pairs,
            time_budget: config.sweep_budget_secs.map(Duration::from_secs),
            ..Self::default()
        }
    }
}

/// A pair of records plausibly describing the same event, with the
/// aggregate heuristic score and a human-readable breakdown for audit.
#[derive(Debug, Clone)]
pub struct DuplicateCandidate {
    pub record_a: IncidentRecord,
    pub record_b: IncidentRecord,
    pub score: f64,
    pub explanation: String,
}

/// Finds candidate duplicate pairs within one state using a sliding time
/// window over date-sorted records and multi-factor heuristic scoring.
pub struct CandidateGenerator {
    store: Arc<dyn RecordStore>,
    config: DedupConfig,
}

impl CandidateGenerator {
    pub fn new(store: Arc<dyn RecordStore>, config: DedupConfig) -> Self {
        Self { store, config }
    }

    /// Scan one state for candidate pairs. A store failure here is fatal to
    /// the run; everything per-pair is not.
    pub async fn find_candidates(&self, state: &str) -> Result<Vec<DuplicateCandidate>> {
        let all = self.store.find_by_state(state).await?;

        let records: Vec<IncidentRecord> = all
            .into_iter()
            .filter(|r| {
                if !r.is_comparable() {
                    warn!(id = %r.id, "Excluding record without a state from comparison");
                    return false;
                }
                true
            })
            .collect();

        if records.len() < 2 {
            debug!(state, records = records.len(), "Too few records to compare");
            return Ok(Vec::new());
        }

        let window = chrono::Duration::days(self.config.date_window_days);
        let mut candidates = Vec::new();

        for i in 0..records.len() {
            for j in (i + 1)..records.len() {
                // Records are date-sorted, so the first pair outside the
                // window ends the inner scan for this `i`.
                if records[j].date - records[i].date > window {
                    break;
                }

                // Both already examined together by an earlier sweep.
                if records[i].has_tag(CHECKED_DUPLICATE_TAG)
                    && records[j].has_tag(CHECKED_DUPLICATE_TAG)
                {
                    continue;
                }

                if let Some((score, explanation)) =
                    score_pair(&records[i], &records[j], &self.config)
                {
                    candidates.push(DuplicateCandidate {
                        record_a: records[i].clone(),
                        record_b: records[j].clone(),
                        score,
                        explanation,
                    });
                }
            }
        }

        info!(
            state,
            records = records.len(),
            candidates = candidates.len(),
            "Candidate scan complete"
        );

        Ok(candidates)
    }
}

/// Score one pair of same-state records. Returns the aggregate score and an
/// audit explanation when it crosses the acceptance threshold.
///
/// Signals, weighted:
/// - town or LGA similarity above the location threshold: +0.4; otherwise
///   title similarity above the fallback threshold: +0.3 (different sources
///   garble town names but keep the narrative framing);
/// - same actor (similar group name, or a generic attribution): +0.2;
/// - agreeing killed counts: +0.3 (neutral when either is unreported);
/// - same calendar day: +0.1.
pub fn score_pair(
    a: &IncidentRecord,
    b: &IncidentRecord,
    config: &DedupConfig,
) -> Option<(f64, String)> {
    let town_sim = similarity(
        &a.location.town.to_lowercase(),
        &b.location.town.to_lowercase(),
    );
    let lga_sim = similarity(
        &a.location.lga.to_lowercase(),
        &b.location.lga.to_lowercase(),
    );
    let group_sim = similarity(&a.group.to_lowercase(), &b.group.to_lowercase());

    let same_group = group_sim > config.group_threshold
        || is_generic_group(&a.group)
        || is_generic_group(&b.group);

    let casualty = casualty_score(a.casualties.killed, b.casualties.killed);
    let same_day = a.date.date_naive() == b.date.date_naive();

    let mut score = 0.0;

    if town_sim > config.location_threshold || lga_sim > config.location_threshold {
        score += 0.4;
    } else {
        // Towns disagree; fall back to the weaker title signal.
        let title_sim = similarity(&a.title.to_lowercase(), &b.title.to_lowercase());
        if title_sim > config.title_threshold {
            score += 0.3;
        }
    }

    if same_group {
        score += 0.2;
    }
    if casualty > config.casualty_agreement {
        score += 0.3;
    }
    if same_day {
        score += 0.1;
    }

    if score < config.accept_threshold {
        return None;
    }

    let explanation = format!(
        "score {score:.2} (town {town_sim:.2}, lga {lga_sim:.2}, group {group_sim:.2}, \
         casualty {casualty:.2}{})",
        if same_day { ", same day" } else { "" }
    );
    Some((score, explanation))
}

fn is_generic_group(group: &str) -> bool {
    let group = group.to_lowercase();
    GENERIC_GROUP_MARKERS.iter().any(|m| group.contains(m))
}

/// Agreement between killed counts. Both zero is a perfect match; one zero
/// against a nonzero count is suspicious but not disqualifying; an
/// unreported count on either side is neutral, never a penalty.
fn casualty_score(a: Option<u32>, b: Option<u32>) -> f64 {
    match (a, b) {
        (Some(0), Some(0)) => 1.0,
        (Some(0), Some(_)) | (Some(_), Some(0)) => 0.5,
        (Some(k1), Some(k2)) => k1.min(k2) as f64 / k1.max(k2) as f64,
        _ => 1.0,
    }
}
