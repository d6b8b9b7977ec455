//! Postgres persistence for incident records.
//!
//! `PgRecordStore` is the production [`RecordStore`] implementation. It also
//! hands out per-state advisory locks so concurrent sweep schedulers never
//! process the same state twice.
//!
//! [`RecordStore`]: conflictwatch_common::RecordStore

mod store;

pub use store::{PgRecordStore, SweepLock};
