//! # hearth-store
//!
//! Document storage for Hearth, backed by SQLite.
//!
//! Records live as JSON documents addressed by `/`-separated paths and
//! grouped into collections.  The crate exposes a cloneable [`Database`]
//! handle with typed CRUD helpers, filtered [`Query`]s, and live queries that
//! re-deliver a query's full result set whenever its collection changes.  The
//! [`DocumentStore`] trait is the seam the client core programs against.

pub mod accounts;
pub mod database;
pub mod documents;
pub mod live;
pub mod migrations;
pub mod models;
pub mod paths;
pub mod query;
pub mod store;

mod error;

pub use database::Database;
pub use documents::{to_body, Document};
pub use error::{Result, StoreError};
pub use live::{Change, OnChange, OnError, Subscription};
pub use models::*;
pub use paths::Paths;
pub use query::{Direction, FieldValue, Filter, Query};
pub use store::DocumentStore;
