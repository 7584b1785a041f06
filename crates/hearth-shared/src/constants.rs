/// Default namespace segment under which every store path lives
pub const DEFAULT_APP_ID: &str = "default-app-id";

/// Number of most recent messages delivered per channel window
pub const MESSAGE_WINDOW: usize = 50;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Minimum number of characters before a directory search is issued
pub const MIN_SEARCH_LEN: usize = 2;

/// Maximum number of directory search results
pub const MAX_SEARCH_RESULTS: usize = 20;

/// Default debounce delay for search-as-you-type, in milliseconds
pub const SEARCH_DEBOUNCE_MS: u64 = 300;

/// Default GIF search endpoint and page size
pub const DEFAULT_GIF_BASE_URL: &str = "https://tenor.googleapis.com/v2";
pub const DEFAULT_GIF_LIMIT: u32 = 20;

/// Document id of the welcome message written into a new DM channel
pub const WELCOME_MESSAGE_ID: &str = "welcome";

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_PAIR_KEY: &str = "hearth-pair-key-v1";
pub const KDF_CONTEXT_PASSWORD: &str = "hearth-password-v1";
