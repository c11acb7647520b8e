// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Payload-to-column conversion.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::descriptor::{ColumnKind, ColumnSpec, TableSpec};
use crate::error::{DocketError, Result};
use crate::record::FieldValue;

/// Which payload shape is being converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every column may be supplied; required columns must be.
    Create,
    /// Only mutable columns may be supplied. An update overwrites every
    /// mutable column, so an omitted one is written as NULL.
    Update,
}

/// Convert a JSON payload into typed values, in table column order.
///
/// Unknown keys are rejected rather than ignored.
pub fn convert_payload(
    spec: &TableSpec,
    payload: &Map<String, Value>,
    mode: Mode,
) -> Result<Vec<(String, FieldValue)>> {
    for key in payload.keys() {
        let known = match mode {
            Mode::Create => spec.column(key).is_some(),
            Mode::Update => spec.column(key).is_some_and(|c| c.mutable),
        };
        if !known {
            return Err(DocketError::InvalidField {
                field: key.clone(),
                reason: match mode {
                    Mode::Create => "unknown field".to_string(),
                    Mode::Update => "field is not updatable".to_string(),
                },
            });
        }
    }

    let columns: Vec<&ColumnSpec> = match mode {
        Mode::Create => spec.columns.iter().collect(),
        Mode::Update => spec.mutable_columns().collect(),
    };

    let mut values = Vec::with_capacity(columns.len());
    for column in columns {
        let value = match payload.get(&column.name) {
            Some(raw) => convert_value(column, raw)?,
            None => FieldValue::Null,
        };
        if column.required && value == FieldValue::Null {
            return Err(DocketError::InvalidField {
                field: column.name.clone(),
                reason: "field is required".to_string(),
            });
        }
        values.push((column.name.clone(), value));
    }
    Ok(values)
}

fn convert_value(column: &ColumnSpec, raw: &Value) -> Result<FieldValue> {
    if raw.is_null() {
        return Ok(FieldValue::Null);
    }
    let mismatch = |expected: &str| DocketError::InvalidField {
        field: column.name.clone(),
        reason: format!("expected {}", expected),
    };
    match column.kind {
        ColumnKind::Text => raw
            .as_str()
            .map(|s| FieldValue::Text(s.to_string()))
            .ok_or_else(|| mismatch("string")),
        ColumnKind::Integer => raw
            .as_i64()
            .map(FieldValue::Integer)
            .ok_or_else(|| mismatch("integer")),
        ColumnKind::Decimal => raw
            .as_f64()
            .map(FieldValue::Decimal)
            .ok_or_else(|| mismatch("number")),
        ColumnKind::Boolean => raw
            .as_bool()
            .map(FieldValue::Boolean)
            .ok_or_else(|| mismatch("boolean")),
        ColumnKind::Timestamp => {
            let text = raw.as_str().ok_or_else(|| DocketError::InvalidDateField {
                field: column.name.clone(),
                reason: "expected a date string".to_string(),
            })?;
            parse_date(text)
                .map(FieldValue::Timestamp)
                .map_err(|reason| DocketError::InvalidDateField {
                    field: column.name.clone(),
                    reason,
                })
        }
    }
}

/// Parse a wire date: RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or `YYYY-MM-DD`
/// (midnight UTC).
pub fn parse_date(text: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        Ok(date) => date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| format!("'{}' is out of range", text)),
        Err(e) => Err(format!("'{}' is not a date: {}", text, e)),
    }
}
