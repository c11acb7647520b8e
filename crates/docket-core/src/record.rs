// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Row and response types shared by the document service and the stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{END_OF_PAGES, ExternalId};

/// Status code of rows visible to reads and updates.
pub const STATUS_ACTIVE: &str = "active";

static NULL_FIELD: FieldValue = FieldValue::Null;

/// Value of `name` in a column/value list; absent columns read as NULL.
pub fn lookup<'a>(values: &'a [(String, FieldValue)], name: &str) -> &'a FieldValue {
    values
        .iter()
        .find(|(column, _)| column == name)
        .map(|(_, value)| value)
        .unwrap_or(&NULL_FIELD)
}

/// A typed business column value ready to bind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// SQL NULL.
    Null,
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Decimal value.
    Decimal(f64),
    /// Boolean value.
    Boolean(bool),
    /// Timestamp value.
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// JSON form used in responses.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Text(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Decimal(d) => serde_json::Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Timestamp(ts) => Value::String(ts.to_rfc3339()),
        }
    }
}

/// Audit columns stamped on every row.
#[derive(Debug, Clone, PartialEq)]
pub struct Audit {
    /// Row status (always `active` on insert).
    pub status_code: String,
    /// Internal ID of the creating user.
    pub created_by_user_id: i64,
    /// Internal ID of the last updating user.
    pub updated_by_user_id: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Audit {
    /// Audit fields for a row created by `actor` at `now`.
    pub fn created(actor: i64, now: DateTime<Utc>) -> Self {
        Self {
            status_code: STATUS_ACTIVE.to_string(),
            created_by_user_id: actor,
            updated_by_user_id: actor,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A row assembled before insert.
///
/// The external ID is fixed here; the internal ID (and, for lines, the
/// header's internal ID) only exist once the insert has run.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRow {
    /// External ID assigned before insert.
    pub uuid: ExternalId,
    /// Business column values, in table column order.
    pub values: Vec<(String, FieldValue)>,
    /// Audit columns.
    pub audit: Audit,
}

impl NewRow {
    /// Turn the pending row into its response form once IDs are known.
    pub fn into_record(self, internal_id: i64, header_internal_id: Option<i64>) -> DocumentRecord {
        let fields = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        DocumentRecord {
            internal_id,
            header_internal_id,
            id: self.uuid,
            fields,
            status_code: self.audit.status_code,
            created_by_user_id: self.audit.created_by_user_id,
            updated_by_user_id: self.audit.updated_by_user_id,
            created_at: self.audit.created_at,
            updated_at: self.audit.updated_at,
        }
    }
}

/// A persisted header or line as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Store-assigned ID; never serialized.
    #[serde(skip)]
    pub internal_id: i64,
    /// Owning header's internal ID (lines only); never serialized.
    #[serde(skip)]
    pub header_internal_id: Option<i64>,
    /// External ID.
    pub id: ExternalId,
    /// Business fields keyed by column name.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Row status.
    pub status_code: String,
    /// Creating user.
    pub created_by_user_id: i64,
    /// Last updating user.
    pub updated_by_user_id: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Business field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A header together with its active lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAggregate {
    /// Header row.
    pub header: DocumentRecord,
    /// Child lines, ascending by internal ID.
    #[serde(default)]
    pub lines: Vec<DocumentRecord>,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items, descending by internal ID.
    pub items: Vec<T>,
    /// Cursor for the next page, or `"0"` when exhausted.
    pub next_cursor: String,
}

impl<T> Page<T> {
    /// Whether more pages may follow.
    pub fn has_more(&self) -> bool {
        self.next_cursor != END_OF_PAGES
    }
}
