mod client;
pub mod types;
pub mod util;

pub use client::GeminiClient;
pub use types::{GenerateContentResponse, GroundingChunk};
