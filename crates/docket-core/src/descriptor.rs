// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Entity descriptors.
//!
//! A descriptor is the only per-document-type input to the document service
//! and the persistence engine: table names, typed business columns, which
//! columns hold dates, which ones an update may overwrite, and the optional
//! child-line table. Adding a document type means adding a descriptor, not a
//! code path.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DocketError, Result};

/// Columns every table carries; business columns may not reuse these names.
pub const RESERVED_COLUMNS: &[&str] = &[
    "id",
    "uuid",
    "header_id",
    "status_code",
    "created_by_user_id",
    "updated_by_user_id",
    "created_at",
    "updated_at",
    "lines",
];

/// Storage type of a business column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Free text.
    Text,
    /// 64-bit integer.
    Integer,
    /// Floating point amount.
    Decimal,
    /// Boolean flag.
    Boolean,
    /// Date/time field, parsed from its wire string.
    Timestamp,
}

/// One business column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column (and payload field) name.
    pub name: String,
    /// Storage type.
    pub kind: ColumnKind,
    /// Whether create commands must supply a non-null value.
    pub required: bool,
    /// Whether update commands overwrite this column.
    pub mutable: bool,
}

impl ColumnSpec {
    fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            mutable: false,
        }
    }

    /// Text column.
    pub fn text(name: &str) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    /// Integer column.
    pub fn integer(name: &str) -> Self {
        Self::new(name, ColumnKind::Integer)
    }

    /// Decimal column.
    pub fn decimal(name: &str) -> Self {
        Self::new(name, ColumnKind::Decimal)
    }

    /// Boolean column.
    pub fn boolean(name: &str) -> Self {
        Self::new(name, ColumnKind::Boolean)
    }

    /// Date column.
    pub fn date(name: &str) -> Self {
        Self::new(name, ColumnKind::Timestamp)
    }

    /// Mark the column as required on create.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the column as overwritten by updates.
    pub fn mutable(mut self) -> Self {
        self.mutable = true;
        self
    }
}

/// A table and its business columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name.
    pub table: String,
    /// Business columns in insert order.
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns an update overwrites, in declaration order.
    pub fn mutable_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.mutable)
    }
}

/// Describes one document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Entity type name used in URLs and commands (e.g. `invoice`).
    pub name: String,
    /// Permission scope (e.g. `invoices` for `create:invoices`).
    pub scope: String,
    /// Dispatcher queue serving this entity's business domain.
    pub queue: String,
    /// Header table.
    pub header: TableSpec,
    /// Child-line table; the foreign key column is always `header_id`.
    pub lines: Option<TableSpec>,
}

impl EntityDescriptor {
    /// Start a descriptor for `name` stored in `table`.
    ///
    /// Scope defaults to the table name and queue to the entity name.
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: table.to_string(),
            queue: name.to_string(),
            header: TableSpec {
                table: table.to_string(),
                columns: Vec::new(),
            },
            lines: None,
        }
    }

    /// Set the permission scope.
    pub fn scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    /// Set the dispatcher queue.
    pub fn queue(mut self, queue: &str) -> Self {
        self.queue = queue.to_string();
        self
    }

    /// Add a header column.
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.header.columns.push(column);
        self
    }

    /// Declare the child-line table.
    pub fn lines(mut self, table: &str, columns: Vec<ColumnSpec>) -> Self {
        self.lines = Some(TableSpec {
            table: table.to_string(),
            columns,
        });
        self
    }

    /// Check names are safe to splice into SQL and do not shadow audit columns.
    pub fn validate(&self) -> Result<()> {
        let tables = std::iter::once(&self.header).chain(self.lines.iter());
        for spec in tables {
            check_identifier(&self.name, &spec.table)?;
            for column in &spec.columns {
                check_identifier(&self.name, &column.name)?;
                if RESERVED_COLUMNS.contains(&column.name.as_str()) {
                    return Err(invalid_descriptor(
                        &self.name,
                        format!("column '{}' is reserved", column.name),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn check_identifier(entity: &str, ident: &str) -> Result<()> {
    let valid = !ident.is_empty()
        && ident.len() <= 63
        && ident.starts_with(|c: char| c.is_ascii_lowercase())
        && ident
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(invalid_descriptor(
            entity,
            format!("'{}' is not a valid identifier", ident),
        ))
    }
}

fn invalid_descriptor(entity: &str, reason: String) -> DocketError {
    DocketError::Internal {
        reason: format!("descriptor '{}': {}", entity, reason),
    }
}

/// Registry of document types known to a deployment.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entries: HashMap<String, Arc<EntityDescriptor>>,
}

impl EntityCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any previous one with the same name.
    pub fn register(&mut self, descriptor: EntityDescriptor) -> Result<()> {
        descriptor.validate()?;
        self.entries
            .insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Look up a descriptor by entity name.
    pub fn get(&self, entity: &str) -> Result<Arc<EntityDescriptor>> {
        self.entries
            .get(entity)
            .cloned()
            .ok_or_else(|| DocketError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    /// All descriptors, sorted by name.
    pub fn descriptors(&self) -> Vec<Arc<EntityDescriptor>> {
        let mut all: Vec<_> = self.entries.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Distinct queue names, sorted.
    pub fn queues(&self) -> Vec<String> {
        let mut queues: Vec<String> = self.entries.values().map(|d| d.queue.clone()).collect();
        queues.sort();
        queues.dedup();
        queues
    }

    /// The document types shipped with docket.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for descriptor in builtin_descriptors() {
            // Built-in names are static and valid.
            catalog
                .entries
                .insert(descriptor.name.clone(), Arc::new(descriptor));
        }
        catalog
    }
}

fn billing_lines() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::integer("item_id").required(),
        ColumnSpec::text("note"),
        ColumnSpec::decimal("invoiced_quantity"),
        ColumnSpec::decimal("line_extension_amount"),
        ColumnSpec::date("tax_point_date"),
        ColumnSpec::text("accounting_cost"),
    ]
}

fn billing_document(name: &str, table: &str, lines_table: &str) -> EntityDescriptor {
    EntityDescriptor::new(name, table)
        .queue("billing")
        .column(ColumnSpec::text("note").mutable())
        .column(ColumnSpec::date("issue_date"))
        .column(ColumnSpec::date("due_date").mutable())
        .column(ColumnSpec::date("tax_point_date"))
        .column(ColumnSpec::text("document_currency_code"))
        .column(ColumnSpec::text("accounting_cost").mutable())
        .column(ColumnSpec::integer("supplier_party_id"))
        .column(ColumnSpec::integer("customer_party_id"))
        .column(ColumnSpec::decimal("line_extension_amount"))
        .column(ColumnSpec::decimal("tax_exclusive_amount"))
        .column(ColumnSpec::decimal("payable_amount").mutable())
        .lines(lines_table, billing_lines())
}

fn logistics_document(name: &str, table: &str, lines_table: &str) -> EntityDescriptor {
    EntityDescriptor::new(name, table)
        .queue("logistics")
        .column(ColumnSpec::text("note").mutable())
        .column(ColumnSpec::date("issue_date"))
        .column(ColumnSpec::text("document_status_code").mutable())
        .column(ColumnSpec::integer("shipment_id"))
        .column(ColumnSpec::integer("order_id"))
        .column(ColumnSpec::integer("supplier_party_id"))
        .column(ColumnSpec::integer("customer_party_id"))
        .lines(
            lines_table,
            vec![
                ColumnSpec::integer("item_id").required(),
                ColumnSpec::text("note"),
                ColumnSpec::decimal("delivered_quantity"),
                ColumnSpec::decimal("received_quantity"),
                ColumnSpec::decimal("rejected_quantity"),
                ColumnSpec::text("reject_reason"),
                ColumnSpec::date("received_date"),
            ],
        )
}

fn builtin_descriptors() -> Vec<EntityDescriptor> {
    vec![
        billing_document("invoice", "invoices", "invoice_lines"),
        billing_document("credit_note", "credit_notes", "credit_note_lines"),
        billing_document("debit_note", "debit_notes", "debit_note_lines"),
        logistics_document("despatch_advice", "despatch_advices", "despatch_advice_lines"),
        logistics_document("receipt_advice", "receipt_advices", "receipt_advice_lines"),
        EntityDescriptor::new("tax_scheme", "tax_schemes")
            .queue("billing")
            .column(ColumnSpec::text("tax_scheme_code").required())
            .column(ColumnSpec::text("name").mutable())
            .column(ColumnSpec::text("tax_type_code").mutable())
            .column(ColumnSpec::text("currency_code").mutable())
            .column(ColumnSpec::boolean("jurisdiction_wide").mutable()),
    ]
}
