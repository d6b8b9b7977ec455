use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Gemini
    pub gemini_api_key: String,
    pub gemini_model: String,

    // Sweep tunables
    pub sweep_window_days: i64,
    pub sweep_max_pairs: usize,
    pub sweep_budget_secs: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            gemini_api_key: required_env("GEMINI_API_KEY"),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            sweep_window_days: env::var("SWEEP_WINDOW_DAYS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .expect("SWEEP_WINDOW_DAYS must be a number"),
            sweep_max_pairs: env::var("SWEEP_MAX_PAIRS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .expect("SWEEP_MAX_PAIRS must be a number"),
            sweep_budget_secs: env::var("SWEEP_BUDGET_SECS")
                .ok()
                .map(|v| v.parse().expect("SWEEP_BUDGET_SECS must be a number")),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
