use hearth_shared::Notice;
use hearth_store::StoreError;
use thiserror::Error;

use crate::identity::AuthError;

/// Errors surfaced by client operations.
///
/// None of them is fatal: every variant maps to a [`Notice`] and leaves the
/// session usable.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Rejected input (empty names, self-requests, ...).  Nothing was written.
    #[error("{0}")]
    Validation(String),

    /// The signed-in user may not perform this action.
    #[error("{0}")]
    Forbidden(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl ClientError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ClientError::Validation(msg.into())
    }

    /// The user-visible notice for this error.
    pub fn notice(&self) -> Notice {
        match self {
            ClientError::Validation(msg) | ClientError::Forbidden(msg) => {
                Notice::error(msg.clone())
            }
            ClientError::NotSignedIn => Notice::error("Please sign in first."),
            ClientError::Auth(e) => Notice::error(e.user_message()),
            ClientError::Store(e) => Notice::error(format!("Something went wrong: {e}")),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
