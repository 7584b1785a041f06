//! # hearth-client
//!
//! Client core for Hearth: authentication, the friends graph, group and
//! direct-message channels, message streams and debounced search.
//!
//! Everything hangs off an [`AppContext`].  Signing in yields a
//! [`ChatSession`] whose live state is exposed through `watch` receivers,
//! while user-visible outcomes arrive as [`ClientEvent`]s.

pub mod commands;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod gif;
pub mod identity;
pub mod search;
pub mod session;
pub mod state;

#[cfg(test)]
mod test_support;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::{ClientEvent, EventBus};
pub use identity::{AuthError, AuthUser, IdentityProvider, LocalIdentity};
pub use session::ChatSession;
pub use state::AppContext;

/// Install the global tracing subscriber.  `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hearth_client=debug,hearth_store=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
