//! Configuration constants for the transfer tool.

use std::env;
use std::time::Duration;

/// Production Metagame instance
pub const METAGAME_DOMAIN: &str = "https://meta-game.io";

/// Listing endpoint for a profile's events, under `/api/spaces/{space}/profiles/{profile}/`
pub const GET_EVENTS_ENDPOINT: &str = "events";

/// Bulk-create endpoint for a profile's events
pub const CREATE_EVENTS_ENDPOINT: &str = "bulk_create_events";

/// Items requested per listing page
pub const PER_PAGE: usize = 50;

/// Records sent per bulk-create request
pub const BATCH_SIZE: usize = 100;

/// Request timeout in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Directory exports are written under
pub const RESULTS_DIR: &str = "results";

/// Item type name for events, also the export file stem
pub const EVENTS_ITEM_TYPE: &str = "events";

/// Path segments of a profile endpoint; the trailing empty segment keeps the
/// final `/` the API expects
pub fn profile_segments<'a>(space: &'a str, profile: &'a str, endpoint: &'a str) -> [&'a str; 7] {
    ["api", "spaces", space, "profiles", profile, endpoint, ""]
}

/// Get request timeout as Duration
pub fn get_request_timeout() -> Duration {
    Duration::from_secs(REQUEST_TIMEOUT_SECS)
}

/// Logging configuration, read from environment variables
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,

    /// Enable JSON logging
    pub log_json: bool,
}

impl LogConfig {
    /// Load logging configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}
