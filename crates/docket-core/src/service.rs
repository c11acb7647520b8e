// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The document service: one code path for every registered document type.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::actor::ActorResolver;
use crate::command::{Command, CommandAction, CommandOutput, DocumentQuery, QueryOutput, UPDATED_SUCCESSFULLY};
use crate::descriptor::{EntityCatalog, EntityDescriptor};
use crate::error::{DocketError, Result};
use crate::fields::{Mode, convert_payload};
use crate::ids::{END_OF_PAGES, ExternalId, cursor_after, decode_cursor};
use crate::persistence::{DocumentStore, line_spec};
use crate::record::{Audit, DocumentAggregate, DocumentRecord, NewRow, Page};

/// Page size when the caller gives none.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Creates, updates and reads documents described by an [`EntityCatalog`].
#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    catalog: Arc<EntityCatalog>,
    actors: Arc<dyn ActorResolver>,
}

impl DocumentService {
    /// Create a service over `store`.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        catalog: Arc<EntityCatalog>,
        actors: Arc<dyn ActorResolver>,
    ) -> Self {
        Self {
            store,
            catalog,
            actors,
        }
    }

    /// Registered document types.
    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    /// Create tables for every registered document type.
    pub async fn ensure_schema(&self) -> Result<()> {
        for descriptor in self.catalog.descriptors() {
            self.store.ensure_schema(&descriptor).await?;
        }
        info!(
            entities = self.catalog.descriptors().len(),
            "Document schema ready"
        );
        Ok(())
    }

    /// Run a mutation.
    ///
    /// The caller is resolved to an internal actor ID once, before anything
    /// else happens; every row the command writes is stamped with it.
    #[instrument(
        skip(self, command),
        fields(
            entity = %command.entity,
            kind = command.action.kind(),
            request_id = %command.request_id,
            user_id = %command.caller.user_id,
        )
    )]
    pub async fn execute(&self, command: Command) -> Result<CommandOutput> {
        let descriptor = self.catalog.get(&command.entity)?;
        let actor = self
            .actors
            .resolve_actor(&command.caller, &command.request_id)
            .await?;

        match command.action {
            CommandAction::Create { fields, lines } => {
                let document = self.create(&descriptor, actor, &fields, &lines).await?;
                Ok(CommandOutput::Created { document })
            }
            CommandAction::Update { id, fields } => {
                let id = ExternalId::parse(&id)?;
                self.update(&descriptor, actor, &id, &fields).await?;
                Ok(CommandOutput::Updated {
                    message: UPDATED_SUCCESSFULLY.to_string(),
                })
            }
        }
    }

    /// Run a read.
    #[instrument(skip(self))]
    pub async fn query(&self, query: DocumentQuery) -> Result<QueryOutput> {
        match query {
            DocumentQuery::Get {
                entity,
                id,
                include_lines,
            } => {
                let document = self.get_by_external_id(&entity, &id, include_lines).await?;
                Ok(QueryOutput::Document { document })
            }
            DocumentQuery::List {
                entity,
                cursor,
                limit,
            } => {
                let page = self.list(&entity, cursor.as_deref(), limit).await?;
                Ok(QueryOutput::Page { page })
            }
            DocumentQuery::Lines { entity, id } => {
                let lines = self.child_lines(&entity, &id).await?;
                Ok(QueryOutput::Lines { lines })
            }
        }
    }

    /// Insert a header and its lines as one transaction.
    ///
    /// External IDs are generated here, before the insert; internal IDs
    /// come back from the store and are written into the response.
    pub async fn create(
        &self,
        descriptor: &EntityDescriptor,
        actor: i64,
        fields: &Map<String, Value>,
        lines: &[Map<String, Value>],
    ) -> Result<DocumentAggregate> {
        let now = Utc::now().trunc_subsecs(6);
        let header = NewRow {
            uuid: ExternalId::generate(),
            values: convert_payload(&descriptor.header, fields, Mode::Create)?,
            audit: Audit::created(actor, now),
        };

        let mut new_lines = Vec::with_capacity(lines.len());
        if !lines.is_empty() {
            let spec = line_spec(descriptor)?;
            for payload in lines {
                new_lines.push(NewRow {
                    uuid: ExternalId::generate(),
                    values: convert_payload(spec, payload, Mode::Create)?,
                    audit: Audit::created(actor, now),
                });
            }
        }

        let ids = self
            .store
            .insert_document(descriptor, &header, &new_lines)
            .await?;

        let lines = new_lines
            .into_iter()
            .zip(ids.line_ids)
            .map(|(row, line_id)| row.into_record(line_id, Some(ids.header_id)))
            .collect();
        let header = header.into_record(ids.header_id, None);
        info!(entity = %descriptor.name, id = %header.id, "Document created");

        Ok(DocumentAggregate { header, lines })
    }

    /// Overwrite the mutable fields of an active header.
    pub async fn update(
        &self,
        descriptor: &EntityDescriptor,
        actor: i64,
        id: &ExternalId,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        let values = convert_payload(&descriptor.header, fields, Mode::Update)?;
        let now = Utc::now().trunc_subsecs(6);
        let affected = self
            .store
            .update_header(descriptor, id, &values, actor, now)
            .await?;
        if affected == 0 {
            return Err(DocketError::NotFound {
                entity: descriptor.name.clone(),
                id: id.to_string(),
            });
        }
        info!(entity = %descriptor.name, id = %id, "Document updated");
        Ok(())
    }

    /// Active header by external ID, optionally with its lines.
    pub async fn get_by_external_id(
        &self,
        entity: &str,
        id: &str,
        include_lines: bool,
    ) -> Result<DocumentAggregate> {
        let descriptor = self.catalog.get(entity)?;
        let header = self.require_header(&descriptor, id).await?;
        let lines = if include_lines && descriptor.lines.is_some() {
            self.store
                .list_lines(&descriptor, header.internal_id)
                .await?
        } else {
            Vec::new()
        };
        Ok(DocumentAggregate { header, lines })
    }

    /// Active header by internal ID.
    pub async fn get_by_internal_id(&self, entity: &str, internal_id: i64) -> Result<DocumentRecord> {
        let descriptor = self.catalog.get(entity)?;
        self.store
            .find_header_by_internal_id(&descriptor, internal_id)
            .await?
            .ok_or_else(|| DocketError::NotFound {
                entity: descriptor.name.clone(),
                id: internal_id.to_string(),
            })
    }

    /// One page of active headers, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_PAGE_SIZE`] and is clamped to
    /// `1..=MAX_PAGE_SIZE`. The returned cursor is `"0"` once the scan is
    /// exhausted.
    pub async fn list(
        &self,
        entity: &str,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Page<DocumentRecord>> {
        let descriptor = self.catalog.get(entity)?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let watermark = match cursor {
            None | Some("") => None,
            Some(cursor) => Some(decode_cursor(cursor)?),
        };

        if watermark == Some(0) {
            return Ok(Page {
                items: Vec::new(),
                next_cursor: END_OF_PAGES.to_string(),
            });
        }

        let items = self
            .store
            .list_headers(&descriptor, watermark, limit)
            .await?;
        let next_cursor = match items.last() {
            Some(last) if items.len() as i64 == limit => cursor_after(last.internal_id),
            _ => END_OF_PAGES.to_string(),
        };
        debug!(entity, items = items.len(), next_cursor = %next_cursor, "Listed documents");

        Ok(Page { items, next_cursor })
    }

    /// Active lines of a header, ascending by internal ID.
    pub async fn child_lines(&self, entity: &str, id: &str) -> Result<Vec<DocumentRecord>> {
        let descriptor = self.catalog.get(entity)?;
        let header = self.require_header(&descriptor, id).await?;
        if descriptor.lines.is_none() {
            return Ok(Vec::new());
        }
        self.store.list_lines(&descriptor, header.internal_id).await
    }

    async fn require_header(&self, descriptor: &EntityDescriptor, id: &str) -> Result<DocumentRecord> {
        let external_id = ExternalId::parse(id)?;
        self.store
            .find_header(descriptor, &external_id)
            .await?
            .ok_or_else(|| DocketError::NotFound {
                entity: descriptor.name.clone(),
                id: external_id.to_string(),
            })
    }
}
