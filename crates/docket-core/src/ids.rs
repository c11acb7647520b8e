// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! External identifiers and pagination cursors.
//!
//! Rows carry two identities: the store-assigned internal `id` (ordering and
//! pagination only) and a 16-byte random external ID that clients see. The
//! internal ID only crosses the persistence boundary as cursor material.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DocketError, Result};

/// Cursor emitted when no further pages exist.
pub const END_OF_PAGES: &str = "0";

/// Client-facing document identifier.
///
/// Assigned before insert from 16 random bytes and never changed afterwards.
/// Rendered as the canonical lowercase hyphenated UUID form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalId(Uuid);

impl ExternalId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the canonical 36-character form.
    pub fn parse(value: &str) -> Result<Self> {
        // Uuid::try_parse also accepts simple, braced and urn forms.
        if value.len() != 36 {
            return Err(DocketError::InvalidIdentifier {
                value: value.to_string(),
            });
        }
        let uuid = Uuid::try_parse(value).map_err(|_| DocketError::InvalidIdentifier {
            value: value.to_string(),
        })?;
        if uuid.is_nil() {
            return Err(DocketError::InvalidIdentifier {
                value: value.to_string(),
            });
        }
        Ok(Self(uuid))
    }

    /// Rebuild from the 16 bytes stored in the `uuid` column.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|_| DocketError::InvalidIdentifier {
                value: format!("<{} bytes>", bytes.len()),
            })
    }

    /// The raw 16-byte value.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ExternalId {
    type Err = DocketError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ExternalId {
    type Error = DocketError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ExternalId> for String {
    fn from(id: ExternalId) -> Self {
        id.to_string()
    }
}

/// Encode a scan watermark ("continue at or below this internal ID").
pub fn encode_cursor(watermark: i64) -> String {
    URL_SAFE_NO_PAD.encode(watermark.to_string())
}

/// Decode a cursor back into its watermark.
///
/// The end-of-pages sentinel decodes to `0`, which matches no rows.
pub fn decode_cursor(cursor: &str) -> Result<i64> {
    if cursor == END_OF_PAGES {
        return Ok(0);
    }
    let invalid = || DocketError::InvalidCursor {
        value: cursor.to_string(),
    };
    let bytes = URL_SAFE_NO_PAD.decode(cursor).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    let watermark: i64 = text.parse().map_err(|_| invalid())?;
    if watermark < 0 {
        return Err(invalid());
    }
    Ok(watermark)
}

/// Cursor that resumes strictly before `last_id` in a descending scan.
pub fn cursor_after(last_id: i64) -> String {
    if last_id <= 1 {
        return END_OF_PAGES.to_string();
    }
    encode_cursor(last_id - 1)
}
