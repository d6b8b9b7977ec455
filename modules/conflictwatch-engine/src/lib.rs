//! Incident deduplication and merge engine.
//!
//! Given the incident records of one state, the candidate generator finds
//! pairs plausibly describing the same real-world event (sliding time window
//! plus heuristic scoring). The sweep runner asks a `DuplicateOracle` for the
//! final verdict on each candidate pair, merges confirmed duplicates
//! losslessly, and retires the absorbed record.

pub mod candidates;
pub mod merge;
pub mod oracle;
pub mod similarity;
pub mod sweep;
pub mod testing;

pub use candidates::{CandidateGenerator, DedupConfig, DuplicateCandidate};
pub use merge::merge_records;
pub use oracle::{BetterReport, DuplicateOracle, OracleVerdict};
pub use sweep::{SweepAction, SweepOutcome, SweepRunner};
