//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can start with zero
//! configuration for local development.

use std::path::PathBuf;
use std::time::Duration;

use hearth_shared::constants::{
    DEFAULT_APP_ID, DEFAULT_GIF_BASE_URL, DEFAULT_GIF_LIMIT, MESSAGE_WINDOW, SEARCH_DEBOUNCE_MS,
};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Database file.  `None` selects the platform data directory.
    /// Env: `HEARTH_DB_PATH`
    pub database_path: Option<PathBuf>,

    /// Namespace segment every store path lives under.
    /// Env: `HEARTH_APP_ID`
    /// Default: `default-app-id`
    pub app_id: String,

    /// Base URL of the GIF search API.
    /// Env: `GIF_API_BASE_URL`
    /// Default: `https://tenor.googleapis.com/v2`
    pub gif_base_url: String,

    /// API key for the GIF search API.  GIF search is disabled without one.
    /// Env: `GIF_API_KEY`
    pub gif_api_key: Option<String>,

    /// Client identifier reported to the GIF search API.
    /// Env: `GIF_CLIENT_KEY`
    /// Default: `hearth`
    pub gif_client_key: String,

    /// Number of GIF results per request.
    /// Env: `GIF_RESULT_LIMIT`
    /// Default: `20`
    pub gif_limit: u32,

    /// Delay before a search-as-you-type query is dispatched.
    /// Env: `SEARCH_DEBOUNCE_MS`
    /// Default: `300`
    pub search_debounce: Duration,

    /// Number of most recent messages delivered per channel.
    /// Env: `MESSAGE_WINDOW`
    /// Default: `50`
    pub message_window: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            app_id: DEFAULT_APP_ID.to_string(),
            gif_base_url: DEFAULT_GIF_BASE_URL.to_string(),
            gif_api_key: None,
            gif_client_key: "hearth".to_string(),
            gif_limit: DEFAULT_GIF_LIMIT,
            search_debounce: Duration::from_millis(SEARCH_DEBOUNCE_MS),
            message_window: MESSAGE_WINDOW,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("HEARTH_DB_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(app_id) = lookup("HEARTH_APP_ID") {
            if is_valid_segment(&app_id) {
                config.app_id = app_id;
            } else {
                tracing::warn!(value = %app_id, "Invalid HEARTH_APP_ID, using default");
            }
        }

        if let Some(url) = lookup("GIF_API_BASE_URL") {
            config.gif_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(key) = lookup("GIF_API_KEY") {
            if !key.is_empty() {
                config.gif_api_key = Some(key);
            }
        }

        if let Some(key) = lookup("GIF_CLIENT_KEY") {
            config.gif_client_key = key;
        }

        if let Some(val) = lookup("GIF_RESULT_LIMIT") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.gif_limit = n,
                _ => tracing::warn!(value = %val, "Invalid GIF_RESULT_LIMIT, using default"),
            }
        }

        if let Some(val) = lookup("SEARCH_DEBOUNCE_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.search_debounce = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %val, "Invalid SEARCH_DEBOUNCE_MS, using default"),
            }
        }

        if let Some(val) = lookup("MESSAGE_WINDOW") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.message_window = n,
                _ => tracing::warn!(value = %val, "Invalid MESSAGE_WINDOW, using default"),
            }
        }

        config
    }
}

/// App ids become a path segment, so they must not contain `/`.
fn is_valid_segment(s: &str) -> bool {
    !s.is_empty() && !s.contains('/')
}
