// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Commands, queries and their outputs.
//!
//! These are the payloads that travel from the gateway through the
//! dispatcher and the activity layer to the document service, so they are
//! all serde types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::{DocumentAggregate, DocumentRecord, Page};

/// Literal response body for a successful update.
pub const UPDATED_SUCCESSFULLY: &str = "Updated Successfully";

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Identity-provider user ID (e.g. `auth0|abc`).
    pub user_id: String,
    /// Caller e-mail.
    pub email: String,
}

/// Mutation kind and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandAction {
    /// Insert a header and its lines.
    Create {
        /// Header fields.
        fields: Map<String, Value>,
        /// Line payloads.
        #[serde(default)]
        lines: Vec<Map<String, Value>>,
    },
    /// Overwrite the mutable fields of an existing header.
    Update {
        /// External ID of the header.
        id: String,
        /// Mutable fields; omitted ones are cleared.
        fields: Map<String, Value>,
    },
}

impl CommandAction {
    /// `create` or `update`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
        }
    }
}

/// An inbound mutation, always carrying caller identity and correlation ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Correlation / request ID.
    pub request_id: String,
    /// Authenticated caller.
    pub caller: CallerIdentity,
    /// Target entity type.
    pub entity: String,
    /// Mutation.
    pub action: CommandAction,
}

impl Command {
    /// Build a create command.
    pub fn create(
        request_id: impl Into<String>,
        caller: CallerIdentity,
        entity: impl Into<String>,
        fields: Map<String, Value>,
        lines: Vec<Map<String, Value>>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            caller,
            entity: entity.into(),
            action: CommandAction::Create { fields, lines },
        }
    }

    /// Build an update command.
    pub fn update(
        request_id: impl Into<String>,
        caller: CallerIdentity,
        entity: impl Into<String>,
        id: impl Into<String>,
        fields: Map<String, Value>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            caller,
            entity: entity.into(),
            action: CommandAction::Update {
                id: id.into(),
                fields,
            },
        }
    }
}

/// Result of a successful command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutput {
    /// Created aggregate.
    Created {
        /// Header plus lines with back-filled IDs.
        document: DocumentAggregate,
    },
    /// Update applied.
    Updated {
        /// Always [`UPDATED_SUCCESSFULLY`].
        message: String,
    },
}

/// Read-side request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentQuery {
    /// Header by external ID.
    Get {
        /// Entity type.
        entity: String,
        /// External ID.
        id: String,
        /// Also load the active lines.
        #[serde(default)]
        include_lines: bool,
    },
    /// Page of active headers.
    List {
        /// Entity type.
        entity: String,
        /// Cursor from a previous page.
        #[serde(default)]
        cursor: Option<String>,
        /// Page size.
        #[serde(default)]
        limit: Option<i64>,
    },
    /// Active lines of a header.
    Lines {
        /// Entity type.
        entity: String,
        /// Header external ID.
        id: String,
    },
}

/// Result of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutput {
    /// Single document.
    Document {
        /// Header (and lines when requested).
        document: DocumentAggregate,
    },
    /// Listing page.
    Page {
        /// The page.
        page: Page<DocumentRecord>,
    },
    /// Lines of one header.
    Lines {
        /// The lines.
        lines: Vec<DocumentRecord>,
    },
}
