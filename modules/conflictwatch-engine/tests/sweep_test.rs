//! Sweep runner tests: candidate pairs → oracle verdict → merge/retire.
//!
//! Each test: seed MemoryRecordStore → run SweepRunner with a scripted
//! FakeOracle → assert on outcomes and store state. No I/O, no LLM, no
//! database.

use std::sync::Arc;
use std::time::Duration;

use conflictwatch_common::{IncidentStatus, CHECKED_DUPLICATE_TAG};
use conflictwatch_engine::testing::{day, incident, source, FakeOracle, MemoryRecordStore};
use conflictwatch_engine::{
    BetterReport, CandidateGenerator, DedupConfig, DuplicateCandidate, SweepAction, SweepRunner,
};

fn pair(
    a: &conflictwatch_common::IncidentRecord,
    b: &conflictwatch_common::IncidentRecord,
    score: f64,
) -> DuplicateCandidate {
    DuplicateCandidate {
        record_a: a.clone(),
        record_b: b.clone(),
        score,
        explanation: String::new(),
    }
}

#[tokio::test]
async fn confirmed_duplicate_merges_into_better_report() {
    let store = Arc::new(MemoryRecordStore::new());

    // Same Gwoza attack reported twice: the second report is fuller.
    let mut a = incident("Borno", "Gwoza", day(2024, 3, 1));
    a.casualties.killed = Some(5);
    a.sources.push(source("https://a.example/first"));
    a.description = "Attack reported.".to_string();

    let mut b = incident("Borno", "Gwoza", day(2024, 3, 1));
    b.casualties.killed = Some(7);
    b.casualties.injured = Some(12);
    b.sources.push(source("https://b.example/detailed"));
    b.description = "Armed men attacked Gwoza town, burning houses and shops.".to_string();
    b.status = IncidentStatus::Confirmed;

    store.seed(a.clone()).await;
    store.seed(b.clone()).await;

    let oracle = Arc::new(FakeOracle::confirming(BetterReport::Existing));
    let runner = SweepRunner::new(store.clone(), oracle, DedupConfig::default());

    let outcomes = runner.run(vec![pair(&a, &b, 0.9)]).await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(
        outcomes[0].action,
        SweepAction::Merged {
            kept: b.id,
            absorbed: a.id,
        }
    );

    // A is gone; B absorbed everything A knew.
    assert!(!store.contains(a.id));
    let kept = store.get(b.id).unwrap();
    assert_eq!(kept.casualties.killed, Some(7));
    assert_eq!(kept.casualties.injured, Some(12));
    assert_eq!(kept.status, IncidentStatus::Confirmed);
    assert_eq!(kept.sources.len(), 2);
    assert_eq!(kept.sources[0].url, "https://b.example/detailed");
    assert_eq!(kept.sources[1].url, "https://a.example/first");
}

#[tokio::test]
async fn oracle_failure_touches_nothing() {
    let store = Arc::new(MemoryRecordStore::new());
    let a = incident("Borno", "Gwoza", day(2024, 3, 1));
    let b = incident("Borno", "Gwoza", day(2024, 3, 2));
    store.seed(a.clone()).await;
    store.seed(b.clone()).await;

    let oracle = Arc::new(FakeOracle::failing());
    let runner = SweepRunner::new(store.clone(), oracle, DedupConfig::default());

    let outcomes = runner.run(vec![pair(&a, &b, 0.8)]).await;

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].action, SweepAction::Failed { .. }));
    assert_eq!(store.record_count(), 2);
    assert!(store.get(a.id).unwrap().tags.is_empty());
}

#[tokio::test]
async fn rejected_pair_is_tagged_checked() {
    let store = Arc::new(MemoryRecordStore::new());
    let a = incident("Plateau", "Jos", day(2024, 5, 10));
    let b = incident("Plateau", "Jos", day(2024, 5, 11));
    store.seed(a.clone()).await;
    store.seed(b.clone()).await;

    let oracle = Arc::new(FakeOracle::rejecting());
    let runner = SweepRunner::new(store.clone(), oracle, DedupConfig::default());

    let outcomes = runner.run(vec![pair(&a, &b, 0.7)]).await;

    assert!(matches!(outcomes[0].action, SweepAction::Rejected { .. }));
    assert_eq!(store.record_count(), 2);
    assert!(store.get(a.id).unwrap().has_tag(CHECKED_DUPLICATE_TAG));
    assert!(store.get(b.id).unwrap().has_tag(CHECKED_DUPLICATE_TAG));
}

#[tokio::test]
async fn retired_record_skips_later_pairs() {
    let store = Arc::new(MemoryRecordStore::new());
    let a = incident("Borno", "Gwoza", day(2024, 3, 1));
    let b = incident("Borno", "Gwoza", day(2024, 3, 1));
    let c = incident("Borno", "Gwoza", day(2024, 3, 2));
    store.seed(a.clone()).await;
    store.seed(b.clone()).await;
    store.seed(c.clone()).await;

    let oracle = Arc::new(FakeOracle::confirming(BetterReport::Existing));
    let runner = SweepRunner::new(store.clone(), oracle.clone(), DedupConfig::default());

    // Highest score first: (A,B) merges, absorbing A; (A,C) must then skip.
    let outcomes = runner.run(vec![pair(&a, &c, 0.7), pair(&a, &b, 0.9)]).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(
        outcomes[0].action,
        SweepAction::Merged {
            kept: b.id,
            absorbed: a.id,
        }
    );
    assert_eq!(outcomes[1].action, SweepAction::SkippedRetired);
    assert_eq!(oracle.calls(), 1);
    assert!(store.contains(c.id));
}

#[tokio::test]
async fn chained_merges_accumulate_into_primary() {
    let store = Arc::new(MemoryRecordStore::new());

    // One event, three reports. A wins both pairs, so it must end up
    // holding everything B and C knew even though the second pair was
    // generated before the first merge rewrote A.
    let mut a = incident("Borno", "Gwoza", day(2024, 3, 1));
    a.casualties.killed = Some(5);
    a.sources.push(source("https://a.example/sa"));

    let mut b = incident("Borno", "Gwoza", day(2024, 3, 1));
    b.casualties.killed = Some(9);
    b.sources.push(source("https://b.example/sb"));

    let mut c = incident("Borno", "Gwoza", day(2024, 3, 1));
    c.casualties.killed = Some(3);
    c.casualties.kidnapped = Some(4);
    c.sources.push(source("https://c.example/sc"));

    store.seed(a.clone()).await;
    store.seed(b.clone()).await;
    store.seed(c.clone()).await;

    let oracle = Arc::new(FakeOracle::confirming(BetterReport::Candidate));
    let runner = SweepRunner::new(store.clone(), oracle, DedupConfig::default());

    let outcomes = runner.run(vec![pair(&a, &b, 0.9), pair(&a, &c, 0.8)]).await;

    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0].action, SweepAction::Merged { .. }));
    assert!(matches!(outcomes[1].action, SweepAction::Merged { .. }));

    assert_eq!(store.record_count(), 1);
    let kept = store.get(a.id).unwrap();
    assert_eq!(kept.casualties.killed, Some(9));
    assert_eq!(kept.casualties.kidnapped, Some(4));
    let urls: Vec<&str> = kept.sources.iter().map(|s| s.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://a.example/sa",
            "https://b.example/sb",
            "https://c.example/sc",
        ]
    );
}

#[tokio::test]
async fn exhausted_time_budget_stops_between_pairs() {
    let store = Arc::new(MemoryRecordStore::new());
    let a = incident("Borno", "Gwoza", day(2024, 3, 1));
    let b = incident("Borno", "Gwoza", day(2024, 3, 1));
    store.seed(a.clone()).await;
    store.seed(b.clone()).await;

    let oracle = Arc::new(FakeOracle::confirming(BetterReport::Existing));
    let config = DedupConfig {
        time_budget: Some(Duration::ZERO),
        ..DedupConfig::default()
    };
    let runner = SweepRunner::new(store.clone(), oracle.clone(), config);

    // Budget already spent: the run completes with no pair attempted and
    // the store untouched.
    let outcomes = runner.run(vec![pair(&a, &b, 0.9)]).await;

    assert!(outcomes.is_empty());
    assert_eq!(oracle.calls(), 0);
    assert_eq!(store.record_count(), 2);
}

#[tokio::test]
async fn batch_cap_limits_oracle_calls() {
    let store = Arc::new(MemoryRecordStore::new());
    let records: Vec<_> = (1..=8)
        .map(|d| incident("Kaduna", &format!("Town{d}"), day(2024, 4, d)))
        .collect();
    for r in &records {
        store.seed(r.clone()).await;
    }

    let oracle = Arc::new(FakeOracle::rejecting());
    let config = DedupConfig {
        max_pairs_per_run: 2,
        ..DedupConfig::default()
    };
    let runner = SweepRunner::new(store.clone(), oracle.clone(), config);

    let candidates = vec![
        pair(&records[0], &records[1], 0.9),
        pair(&records[2], &records[3], 0.8),
        pair(&records[4], &records[5], 0.7),
        pair(&records[6], &records[7], 0.6),
    ];
    let outcomes = runner.run(candidates).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(oracle.calls(), 2);
    // Confidence order: the strongest pairs got the slots.
    assert_eq!(outcomes[0].record_a, records[0].id);
    assert_eq!(outcomes[1].record_a, records[2].id);
}

#[tokio::test]
async fn update_failure_keeps_both_records() {
    let store = Arc::new(MemoryRecordStore::new().failing_updates());
    let a = incident("Borno", "Gwoza", day(2024, 3, 1));
    let b = incident("Borno", "Gwoza", day(2024, 3, 1));
    store.seed(a.clone()).await;
    store.seed(b.clone()).await;

    let oracle = Arc::new(FakeOracle::confirming(BetterReport::Existing));
    let runner = SweepRunner::new(store.clone(), oracle, DedupConfig::default());

    let outcomes = runner.run(vec![pair(&a, &b, 0.9)]).await;

    assert!(matches!(outcomes[0].action, SweepAction::Failed { .. }));
    assert!(store.contains(a.id));
    assert!(store.contains(b.id));
}

#[tokio::test]
async fn delete_failure_is_reported_but_merge_sticks() {
    let store = Arc::new(MemoryRecordStore::new().failing_deletes());
    let mut a = incident("Borno", "Gwoza", day(2024, 3, 1));
    a.casualties.killed = Some(9);
    let b = incident("Borno", "Gwoza", day(2024, 3, 1));
    store.seed(a.clone()).await;
    store.seed(b.clone()).await;

    let oracle = Arc::new(FakeOracle::confirming(BetterReport::Existing));
    let runner = SweepRunner::new(store.clone(), oracle, DedupConfig::default());

    let outcomes = runner.run(vec![pair(&a, &b, 0.9)]).await;

    assert!(matches!(outcomes[0].action, SweepAction::Failed { .. }));
    // The merged primary was written before the delete was attempted.
    assert_eq!(store.get(b.id).unwrap().casualties.killed, Some(9));
    // The absorbed record survives until a later sweep retries the delete.
    assert!(store.contains(a.id));
}

#[tokio::test]
async fn second_sweep_finds_nothing_to_do() {
    let store = Arc::new(MemoryRecordStore::new());
    let mut a = incident("Borno", "Gwoza", day(2024, 3, 1));
    a.casualties.killed = Some(5);
    let mut b = incident("Borno", "Gwoza", day(2024, 3, 1));
    b.casualties.killed = Some(6);
    store.seed(a).await;
    store.seed(b).await;

    let config = DedupConfig::default();
    let generator = CandidateGenerator::new(store.clone(), config.clone());
    let oracle = Arc::new(FakeOracle::confirming(BetterReport::Existing));
    let runner = SweepRunner::new(store.clone(), oracle, config);

    let first = generator.find_candidates("Borno").await.unwrap();
    assert_eq!(first.len(), 1);
    let outcomes = runner.run(first).await;
    assert!(matches!(outcomes[0].action, SweepAction::Merged { .. }));
    assert_eq!(store.record_count(), 1);

    // One record left: nothing to pair, nothing to merge.
    let second = generator.find_candidates("Borno").await.unwrap();
    assert!(second.is_empty());
    assert!(runner.run(second).await.is_empty());
}
