//! Document CRUD on the `documents` table.
//!
//! Every write announces the touched collection on the change feed so live
//! queries can re-run.

use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::live::Change;
use crate::paths::{check_collection_path, split_document_path};
use crate::query::Query;

/// A stored document: its path, id (last path segment) and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: String,
    pub id: String,
    pub data: Value,
    /// Insertion order within the store.
    pub seq: i64,
}

impl Document {
    /// Decode the body into a record type.
    ///
    /// The document id is injected as `"id"` when the body does not carry
    /// one, so records can expose their id without storing it twice.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let mut data = self.data.clone();
        if let Value::Object(ref mut map) = data {
            map.entry("id").or_insert_with(|| Value::String(self.id.clone()));
        }
        serde_json::from_value(data).map_err(|e| StoreError::Decode {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

/// Serialize a record into a document body.
pub fn to_body<T: Serialize>(record: &T) -> Result<Value> {
    Ok(serde_json::to_value(record)?)
}

fn require_object(path: &str, data: Value) -> Result<Map<String, Value>> {
    match data {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Decode {
            path: path.to_string(),
            reason: format!("document body must be a JSON object, got {other}"),
        }),
    }
}

impl Database {
    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single document by path.
    pub fn get_document(&self, path: &str) -> Result<Option<Document>> {
        split_document_path(path)?;
        let conn = self.conn();
        conn.query_row(
            "SELECT path, doc_id, data, rowid FROM documents WHERE path = ?1",
            params![path],
            row_to_raw,
        )
        .optional()?
        .map(RawDocument::into_document)
        .transpose()
    }

    /// Run a filtered query against one collection.
    pub fn run_query(&self, query: &Query) -> Result<Vec<Document>> {
        let (sql, params) = query.to_sql()?;
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), row_to_raw)?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?.into_document()?);
        }
        Ok(documents)
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Create or replace a document.
    pub fn put_document(&self, path: &str, data: Value) -> Result<()> {
        let (collection, doc_id) = split_document_path(path)?;
        let body = require_object(path, data)?;

        self.conn().execute(
            "INSERT INTO documents (path, collection, doc_id, data, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET data = excluded.data,
                                             updated_at = excluded.updated_at",
            params![
                path,
                collection,
                doc_id,
                Value::Object(body).to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;

        tracing::debug!(path, "document written");
        self.notify(Change::new(collection, path));
        Ok(())
    }

    /// Create a document only if nothing exists at `path`.
    pub fn insert_document(&self, path: &str, data: Value) -> Result<()> {
        let (collection, doc_id) = split_document_path(path)?;
        let body = require_object(path, data)?;

        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO documents (path, collection, doc_id, data, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                path,
                collection,
                doc_id,
                Value::Object(body).to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }

        tracing::debug!(path, "document created");
        self.notify(Change::new(collection, path));
        Ok(())
    }

    /// Shallow-merge `partial` into an existing document.
    pub fn merge_document(&self, path: &str, partial: Value) -> Result<()> {
        let (collection, _) = split_document_path(path)?;
        let patch = require_object(path, partial)?;

        {
            let mut conn = self.conn();
            let tx = conn.transaction()?;
            let current: Option<String> = tx
                .query_row(
                    "SELECT data FROM documents WHERE path = ?1",
                    params![path],
                    |row| row.get(0),
                )
                .optional()?;
            let current = current.ok_or(StoreError::NotFound)?;

            let mut body = require_object(path, serde_json::from_str(&current)?)?;
            body.extend(patch);

            tx.execute(
                "UPDATE documents SET data = ?1, updated_at = ?2 WHERE path = ?3",
                params![Value::Object(body).to_string(), Utc::now().to_rfc3339(), path],
            )?;
            tx.commit()?;
        }

        tracing::debug!(path, "document updated");
        self.notify(Change::new(collection, path));
        Ok(())
    }

    /// Insert a document with a generated id into `collection`.
    pub fn append_document(&self, collection: &str, data: Value) -> Result<Document> {
        check_collection_path(collection)?;
        let id = Uuid::new_v4().to_string();
        let path = format!("{collection}/{id}");

        self.insert_document(&path, data)?;
        self.get_document(&path)?.ok_or(StoreError::NotFound)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct RawDocument {
    path: String,
    id: String,
    data: String,
    seq: i64,
}

impl RawDocument {
    fn into_document(self) -> Result<Document> {
        let data = serde_json::from_str(&self.data).map_err(|e| StoreError::Decode {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Document {
            path: self.path,
            id: self.id,
            data,
            seq: self.seq,
        })
    }
}

/// Map a `rusqlite::Row` to a [`RawDocument`].
fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDocument> {
    Ok(RawDocument {
        path: row.get(0)?,
        id: row.get(1)?,
        data: row.get(2)?,
        seq: row.get(3)?,
    })
}
