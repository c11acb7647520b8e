// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQL text generated from entity descriptors.
//!
//! Identifiers come from validated descriptors, values are always bound.
//! Placeholders use the `$N` form, which both PostgreSQL and SQLite accept.

use crate::descriptor::{ColumnKind, TableSpec};
use crate::record::STATUS_ACTIVE;

/// SQL dialect of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
}

const AUDIT_COLUMNS: [&str; 5] = [
    "status_code",
    "created_by_user_id",
    "updated_by_user_id",
    "created_at",
    "updated_at",
];

fn placeholders(from: usize, count: usize) -> String {
    (from..from + count)
        .map(|n| format!("${}", n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Column list in bind order: `uuid`, business columns, `header_id` (lines), audit.
fn insert_columns(spec: &TableSpec, is_line: bool) -> Vec<&str> {
    let mut columns = vec!["uuid"];
    columns.extend(spec.columns.iter().map(|c| c.name.as_str()));
    if is_line {
        columns.push("header_id");
    }
    columns.extend(AUDIT_COLUMNS);
    columns
}

/// Column list for reads.
pub fn select_columns(spec: &TableSpec, is_line: bool) -> String {
    let mut columns = vec!["id"];
    columns.extend(insert_columns(spec, is_line));
    columns.join(", ")
}

/// `INSERT … RETURNING id`.
pub fn insert(spec: &TableSpec, is_line: bool) -> String {
    let columns = insert_columns(spec, is_line);
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
        spec.table,
        columns.join(", "),
        placeholders(1, columns.len())
    )
}

/// Single-statement update of every mutable column plus the audit stamp.
///
/// Binds: mutable values in declaration order, updated_by, updated_at, uuid.
pub fn update(spec: &TableSpec) -> String {
    let mut assignments: Vec<String> = spec
        .mutable_columns()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", c.name, i + 1))
        .collect();
    let next = assignments.len() + 1;
    assignments.push(format!("updated_by_user_id = ${}", next));
    assignments.push(format!("updated_at = ${}", next + 1));
    format!(
        "UPDATE {} SET {} WHERE uuid = ${} AND status_code = '{}'",
        spec.table,
        assignments.join(", "),
        next + 2,
        STATUS_ACTIVE
    )
}

/// Active row by external ID.
pub fn select_by_uuid(spec: &TableSpec) -> String {
    format!(
        "SELECT {} FROM {} WHERE uuid = $1 AND status_code = '{}'",
        select_columns(spec, false),
        spec.table,
        STATUS_ACTIVE
    )
}

/// Active row by internal ID.
pub fn select_by_id(spec: &TableSpec) -> String {
    format!(
        "SELECT {} FROM {} WHERE id = $1 AND status_code = '{}'",
        select_columns(spec, false),
        spec.table,
        STATUS_ACTIVE
    )
}

/// Descending scan. With a watermark binds `(watermark, limit)`, otherwise `(limit)`.
pub fn list(spec: &TableSpec, with_watermark: bool) -> String {
    let bound = if with_watermark { " AND id <= $1" } else { "" };
    let limit = if with_watermark { "$2" } else { "$1" };
    format!(
        "SELECT {} FROM {} WHERE status_code = '{}'{} ORDER BY id DESC LIMIT {}",
        select_columns(spec, false),
        spec.table,
        STATUS_ACTIVE,
        bound,
        limit
    )
}

/// Active lines of one header, ascending.
pub fn lines_of(spec: &TableSpec) -> String {
    format!(
        "SELECT {} FROM {} WHERE header_id = $1 AND status_code = '{}' ORDER BY id ASC",
        select_columns(spec, true),
        spec.table,
        STATUS_ACTIVE
    )
}

fn column_type(dialect: Dialect, kind: ColumnKind) -> &'static str {
    match (dialect, kind) {
        (_, ColumnKind::Text) => "TEXT",
        (_, ColumnKind::Integer) => "BIGINT",
        (Dialect::Postgres, ColumnKind::Decimal) => "DOUBLE PRECISION",
        (Dialect::Sqlite, ColumnKind::Decimal) => "REAL",
        (_, ColumnKind::Boolean) => "BOOLEAN",
        (Dialect::Postgres, ColumnKind::Timestamp) => "TIMESTAMPTZ",
        (Dialect::Sqlite, ColumnKind::Timestamp) => "TEXT",
    }
}

/// `CREATE TABLE IF NOT EXISTS` plus indexes for one table.
///
/// `parent` names the header table when `spec` is a line table.
pub fn create_table(dialect: Dialect, spec: &TableSpec, parent: Option<&str>) -> Vec<String> {
    let (pk, uuid, int, ts) = match dialect {
        Dialect::Postgres => ("BIGSERIAL PRIMARY KEY", "BYTEA", "BIGINT", "TIMESTAMPTZ"),
        Dialect::Sqlite => ("INTEGER PRIMARY KEY AUTOINCREMENT", "BLOB", "INTEGER", "TEXT"),
    };

    let mut defs = vec![
        format!("id {}", pk),
        format!("uuid {} NOT NULL UNIQUE", uuid),
    ];
    for column in &spec.columns {
        defs.push(format!("{} {}", column.name, column_type(dialect, column.kind)));
    }
    if let Some(parent) = parent {
        defs.push(format!("header_id {} NOT NULL REFERENCES {}(id)", int, parent));
    }
    defs.push("status_code TEXT NOT NULL".to_string());
    defs.push(format!("created_by_user_id {} NOT NULL", int));
    defs.push(format!("updated_by_user_id {} NOT NULL", int));
    defs.push(format!("created_at {} NOT NULL", ts));
    defs.push(format!("updated_at {} NOT NULL", ts));

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        spec.table,
        defs.join(", ")
    )];
    statements.push(format!(
        "CREATE INDEX IF NOT EXISTS {}_status_id_idx ON {} (status_code, id)",
        spec.table, spec.table
    ));
    if parent.is_some() {
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS {}_header_id_idx ON {} (header_id)",
            spec.table, spec.table
        ));
    }
    statements
}
