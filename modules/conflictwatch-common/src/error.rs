use thiserror::Error;

/// Typed errors for the places a caller matches on the failure kind.
/// Everything else flows through `anyhow` with context.
#[derive(Error, Debug)]
pub enum ConflictWatchError {
    #[error("Validation error: {0}")]
    Validation(String),
}
