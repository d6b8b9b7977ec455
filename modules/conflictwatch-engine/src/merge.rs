use chrono::Utc;

use conflictwatch_common::{Casualties, IncidentRecord};

/// Consolidate a confirmed duplicate pair into the primary record. Lossless
/// by policy: nothing the secondary knew is dropped.
///
/// - sources: union by URL, primary's first;
/// - casualties: per-field max where at least one side reported (later
///   reports typically refine counts upward; taking the max never
///   down-reports severity);
/// - description: the longer one;
/// - status: the more corroborated of the two;
/// - tags: order-preserving union;
/// - identity fields (id, title, date, location, group, hash) stay primary's.
pub fn merge_records(primary: &IncidentRecord, secondary: &IncidentRecord) -> IncidentRecord {
    let mut merged = primary.clone();

    for source in &secondary.sources {
        if !merged.sources.iter().any(|s| s.url == source.url) {
            merged.sources.push(source.clone());
        }
    }

    merged.casualties = Casualties {
        killed: max_reported(primary.casualties.killed, secondary.casualties.killed),
        injured: max_reported(primary.casualties.injured, secondary.casualties.injured),
        kidnapped: max_reported(primary.casualties.kidnapped, secondary.casualties.kidnapped),
        displaced: max_reported(primary.casualties.displaced, secondary.casualties.displaced),
    };

    if secondary.description.chars().count() > merged.description.chars().count() {
        merged.description = secondary.description.clone();
    }

    if secondary.status.corroboration_rank() > merged.status.corroboration_rank() {
        merged.status = secondary.status;
    }

    for tag in &secondary.tags {
        if !merged.tags.contains(tag) {
            merged.tags.push(tag.clone());
        }
    }

    merged.updated_at = Utc::now();
    merged
}

/// Max of the reported values; `None` only when neither side reported.
fn max_reported(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    }
}
