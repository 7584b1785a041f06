//! Filtered collection queries.
//!
//! A [`Query`] targets one collection and supports equality filters,
//! array-membership filters, prefix filters, ordering on a single field and a
//! result limit.  Queries are translated to SQL over the JSON bodies of the
//! `documents` table using SQLite's JSON1 functions; every field path and
//! value is bound as a parameter.

use hearth_shared::{ChannelId, RequestId, UserId};
use rusqlite::types::Value as SqlValue;

use crate::error::{Result, StoreError};
use crate::paths::check_collection_path;

/// A scalar value a filter compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Bool(bool),
}

impl FieldValue {
    fn to_sql(&self) -> SqlValue {
        match self {
            FieldValue::Text(s) => SqlValue::Text(s.clone()),
            FieldValue::Integer(i) => SqlValue::Integer(*i),
            // json_extract yields 0/1 for JSON booleans.
            FieldValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<&UserId> for FieldValue {
    fn from(id: &UserId) -> Self {
        FieldValue::Text(id.0.clone())
    }
}

impl From<&ChannelId> for FieldValue {
    fn from(id: &ChannelId) -> Self {
        FieldValue::Text(id.0.clone())
    }
}

impl From<&RequestId> for FieldValue {
    fn from(id: &RequestId) -> Self {
        FieldValue::Text(id.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `field == value`
    Eq { field: String, value: FieldValue },
    /// `value ∈ field` where `field` is an array.
    ArrayContains { field: String, value: FieldValue },
    /// The string `field` starts with `prefix` (case-sensitive).
    StartsWith { field: String, prefix: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    fn sql(self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter::Eq {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn where_array_contains(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter::ArrayContains {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn where_starts_with(mut self, field: &str, prefix: impl Into<String>) -> Self {
        self.filters.push(Filter::StartsWith {
            field: field.to_string(),
            prefix: prefix.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Reject shapes the store does not support.
    ///
    /// Combining an array-membership filter with an ordering is refused; the
    /// caller must sort the results itself.
    pub fn validate(&self) -> Result<()> {
        check_collection_path(&self.collection)?;

        let has_array_filter = self
            .filters
            .iter()
            .any(|f| matches!(f, Filter::ArrayContains { .. }));
        if has_array_filter && self.order.is_some() {
            return Err(StoreError::UnsupportedQuery(
                "array-contains filters cannot be combined with ordering".into(),
            ));
        }

        for field in self.fields() {
            check_field(field)?;
        }
        Ok(())
    }

    fn fields(&self) -> impl Iterator<Item = &str> {
        self.filters
            .iter()
            .map(|f| match f {
                Filter::Eq { field, .. }
                | Filter::ArrayContains { field, .. }
                | Filter::StartsWith { field, .. } => field.as_str(),
            })
            .chain(self.order.iter().map(|o| o.field.as_str()))
    }

    /// Build the SQL statement and its positional parameters.
    pub(crate) fn to_sql(&self) -> Result<(String, Vec<SqlValue>)> {
        self.validate()?;

        let mut sql = String::from(
            "SELECT path, doc_id, data, rowid FROM documents WHERE collection = ?1",
        );
        let mut params = vec![SqlValue::Text(self.collection.clone())];

        for filter in &self.filters {
            let next = params.len() + 1;
            match filter {
                Filter::Eq { field, value } => {
                    sql.push_str(&format!(
                        " AND json_extract(data, ?{}) = ?{}",
                        next,
                        next + 1
                    ));
                    params.push(json_path(field));
                    params.push(value.to_sql());
                }
                Filter::ArrayContains { field, value } => {
                    sql.push_str(&format!(
                        " AND EXISTS (SELECT 1 FROM json_each(documents.data, ?{}) \
                         WHERE json_each.value = ?{})",
                        next,
                        next + 1
                    ));
                    params.push(json_path(field));
                    params.push(value.to_sql());
                }
                Filter::StartsWith { field, prefix } => {
                    sql.push_str(&format!(
                        " AND substr(json_extract(data, ?{}), 1, ?{}) = ?{}",
                        next,
                        next + 1,
                        next + 2
                    ));
                    params.push(json_path(field));
                    params.push(SqlValue::Integer(prefix.chars().count() as i64));
                    params.push(SqlValue::Text(prefix.clone()));
                }
            }
        }

        match &self.order {
            Some(order) => {
                let next = params.len() + 1;
                let dir = order.direction.sql();
                // rowid breaks ties in insertion order.
                sql.push_str(&format!(
                    " ORDER BY json_extract(data, ?{next}) {dir}, rowid {dir}"
                ));
                params.push(json_path(&order.field));
            }
            None => sql.push_str(" ORDER BY rowid ASC"),
        }

        if let Some(limit) = self.limit {
            let next = params.len() + 1;
            sql.push_str(&format!(" LIMIT ?{next}"));
            params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        Ok((sql, params))
    }
}

fn json_path(field: &str) -> SqlValue {
    SqlValue::Text(format!("$.{field}"))
}

fn check_field(field: &str) -> Result<()> {
    let valid = !field.is_empty()
        && field.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(StoreError::UnsupportedQuery(format!("invalid field name: {field:?}")))
    }
}
