// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP request handlers.
//!
//! Mutations are submitted to the dispatcher as durable executions; reads
//! go straight to the activity backend.

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use docket_activity::{ActivityBackend, ActivityRequest, ActivityResponse};
use docket_core::{
    Command, CommandOutput, DocketError, DocumentAggregate, DocumentQuery, DocumentRecord, Page,
    QueryOutput,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::server::AppState;

/// Header carrying the execution ID of a mutation.
pub static EXECUTION_ID_HEADER: HeaderName = HeaderName::from_static("x-execution-id");

type ApiResult<T> = Result<T, ApiError>;

/// Body of `POST /v1/documents/{entity}`.
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    /// Header fields.
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// One field map per line.
    #[serde(default)]
    pub lines: Vec<Map<String, Value>>,
}

/// Body of `PUT /v1/documents/{entity}/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    /// Mutable header fields.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// Query string of `GET /v1/documents/{entity}/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct GetParams {
    /// Also return the active lines.
    #[serde(default)]
    pub include_lines: bool,
}

/// Query string of `GET /v1/documents/{entity}`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Cursor from a previous page.
    pub cursor: Option<String>,
    /// Page size.
    pub limit: Option<i64>,
}

/// Response body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: &'static str,
    /// Server version.
    pub version: &'static str,
    /// Dispatcher queues.
    pub queues: Vec<String>,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, DocketError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| DocketError::InvalidField {
            field: "body".to_string(),
            reason: rejection.body_text(),
        })
}

fn params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, DocketError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| DocketError::InvalidField {
            field: "query".to_string(),
            reason: rejection.body_text(),
        })
}

fn with_execution_id(mut response: Response, execution_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(execution_id) {
        response
            .headers_mut()
            .insert(EXECUTION_ID_HEADER.clone(), value);
    }
    response
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        queues: state.dispatcher.queues(),
    })
}

/// Submit a mutation and wait for its execution.
async fn dispatch(
    state: &AppState,
    principal: &Principal,
    command: Command,
) -> Result<(String, Result<CommandOutput, DocketError>), DocketError> {
    let descriptor = state.catalog.get(&command.entity)?;
    principal.require(command.action.kind(), &descriptor.scope)?;

    let handle = state
        .dispatcher
        .schedule(
            &descriptor.name,
            &descriptor.queue,
            state.execution,
            command,
            &principal.token,
        )
        .await?;
    let execution_id = handle.execution_id().to_string();
    Ok((execution_id, handle.wait().await))
}

/// POST /v1/documents/{entity}
pub async fn create_document(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path(entity): Path<String>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let payload = body(payload)?;
    let command = Command::create(
        request_id.as_str(),
        principal.identity.clone(),
        entity,
        payload.fields,
        payload.lines,
    );

    let (execution_id, outcome) = dispatch(&state, &principal, command).await?;
    let response = match outcome {
        Ok(CommandOutput::Created { document }) => {
            info!(execution_id = %execution_id, id = %document.header.id, "Document created");
            (StatusCode::CREATED, Json(document)).into_response()
        }
        Ok(CommandOutput::Updated { .. }) => {
            return Err(unexpected_output("create").into());
        }
        Err(e) => ApiError(e).into_response(),
    };
    Ok(with_execution_id(response, &execution_id))
}

/// PUT /v1/documents/{entity}/{id}
pub async fn update_document(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path((entity, id)): Path<(String, String)>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let payload = body(payload)?;
    let command = Command::update(
        request_id.as_str(),
        principal.identity.clone(),
        entity,
        id,
        payload.fields,
    );

    let (execution_id, outcome) = dispatch(&state, &principal, command).await?;
    let response = match outcome {
        Ok(CommandOutput::Updated { message }) => Json(message).into_response(),
        Ok(CommandOutput::Created { .. }) => {
            return Err(unexpected_output("update").into());
        }
        Err(e) => ApiError(e).into_response(),
    };
    Ok(with_execution_id(response, &execution_id))
}

fn unexpected_output(kind: &str) -> DocketError {
    DocketError::Internal {
        reason: format!("{} command produced the wrong output", kind),
    }
}

/// Run a read through the activity backend after checking `read:<scope>`.
async fn read(
    state: &AppState,
    principal: &Principal,
    request_id: &RequestId,
    entity: &str,
    query: DocumentQuery,
) -> Result<QueryOutput, DocketError> {
    let descriptor = state.catalog.get(entity)?;
    principal.require("read", &descriptor.scope)?;
    state
        .backend
        .query(
            query,
            &principal.identity,
            &principal.token,
            request_id.as_str(),
        )
        .await
}

/// GET /v1/documents/{entity}/{id}
pub async fn get_document(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path((entity, id)): Path<(String, String)>,
    query: Result<Query<GetParams>, QueryRejection>,
) -> ApiResult<Response> {
    let GetParams { include_lines } = params(query)?;
    let output = read(
        &state,
        &principal,
        &request_id,
        &entity,
        DocumentQuery::Get {
            entity: entity.clone(),
            id,
            include_lines,
        },
    )
    .await?;

    match output {
        QueryOutput::Document { document } if include_lines => {
            Ok(Json::<DocumentAggregate>(document).into_response())
        }
        QueryOutput::Document { document } => {
            Ok(Json::<DocumentRecord>(document.header).into_response())
        }
        _ => Err(unexpected_output("get").into()),
    }
}

/// GET /v1/documents/{entity}
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path(entity): Path<String>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Page<DocumentRecord>>> {
    let ListParams { cursor, limit } = params(query)?;
    let output = read(
        &state,
        &principal,
        &request_id,
        &entity,
        DocumentQuery::List {
            entity: entity.clone(),
            cursor,
            limit,
        },
    )
    .await?;

    match output {
        QueryOutput::Page { page } => Ok(Json(page)),
        _ => Err(unexpected_output("list").into()),
    }
}

/// GET /v1/documents/{entity}/{id}/lines
pub async fn document_lines(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path((entity, id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<DocumentRecord>>> {
    let output = read(
        &state,
        &principal,
        &request_id,
        &entity,
        DocumentQuery::Lines {
            entity: entity.clone(),
            id,
        },
    )
    .await?;

    match output {
        QueryOutput::Lines { lines } => Ok(Json(lines)),
        _ => Err(unexpected_output("lines").into()),
    }
}

/// GET /v1/executions/{id}
pub async fn get_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> ApiResult<Response> {
    let snapshot = state
        .dispatcher
        .get_execution(&execution_id)
        .ok_or_else(|| DocketError::NotFound {
            entity: "execution".to_string(),
            id: execution_id,
        })?;
    Ok(Json(snapshot).into_response())
}

/// POST /internal/v1/documents/execute
///
/// Serves the document service to remote gateways. The command's caller is
/// replaced by the identity behind the bearer token, and the token's
/// permissions are checked again here.
pub async fn execute_internal(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<ActivityRequest>, JsonRejection>,
) -> ApiResult<Json<ActivityResponse>> {
    match body(payload)? {
        ActivityRequest::Command { mut command } => {
            let descriptor = state.catalog.get(&command.entity)?;
            principal.require(command.action.kind(), &descriptor.scope)?;
            command.caller = principal.identity.clone();

            let output = state.documents.invoke(command, &principal.token).await?;
            Ok(Json(ActivityResponse::Command { output }))
        }
        ActivityRequest::Query { request_id, query } => {
            let entity = match &query {
                DocumentQuery::Get { entity, .. }
                | DocumentQuery::List { entity, .. }
                | DocumentQuery::Lines { entity, .. } => entity.clone(),
            };
            let descriptor = state.catalog.get(&entity)?;
            principal.require("read", &descriptor.scope)?;

            let output = state
                .documents
                .query(query, &principal.identity, &principal.token, &request_id)
                .await?;
            Ok(Json(ActivityResponse::Query { output }))
        }
    }
}
