//! User-invoked operations, grouped by domain.
//!
//! Each service owns a handle to the [`DocumentStore`] and the path layout,
//! validates input before touching the store, and reports its outcome as a
//! record or a [`Notice`](hearth_shared::Notice).
//!
//! [`DocumentStore`]: hearth_store::DocumentStore

pub mod channels;
pub mod friends;
pub mod messaging;

use hearth_store::{Document, StoreError};
use serde::de::DeserializeOwned;

/// Decode every document, skipping (and logging) malformed ones so a single
/// bad record cannot blank a whole view.
pub(crate) fn decode_all<T: DeserializeOwned>(documents: Vec<Document>) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|doc| match doc.decode::<T>() {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(path = %doc.path, error = %e, "Skipping malformed document");
                None
            }
        })
        .collect()
}

/// Treat "already exists" from a conditional create as success.
///
/// Returns `true` if this call created the document.
pub(crate) fn created_or_kept(result: Result<(), StoreError>) -> Result<bool, StoreError> {
    match result {
        Ok(()) => Ok(true),
        Err(StoreError::AlreadyExists(_)) => Ok(false),
        Err(e) => Err(e),
    }
}
