//! Ingestion side of ConflictWatch: search-grounded extraction of recent
//! incident reports, sanitization, and hash-guarded inserts, plus the
//! Gemini-backed duplicate oracle the sweep binary uses.

pub mod extractor;
pub mod oracle;
pub mod pipeline;

pub use extractor::{GeminiExtractor, IncidentExtractor, RawIncident};
pub use oracle::GeminiOracle;
pub use pipeline::{IngestPipeline, IngestStats};
