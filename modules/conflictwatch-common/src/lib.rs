pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::ConflictWatchError;
pub use store::{InsertOutcome, RecordStore};
pub use types::*;
