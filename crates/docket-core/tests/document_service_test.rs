// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document service tests against an in-memory SQLite store.

mod common;

use std::collections::HashSet;

use common::*;
use docket_core::{
    Command, CommandOutput, DocketError, DocumentQuery, END_OF_PAGES, ExternalId, QueryOutput,
    UPDATED_SUCCESSFULLY,
};
use serde_json::json;

async fn create_invoice(
    service: &docket_core::DocumentService,
    fields: serde_json::Value,
    lines: Vec<serde_json::Value>,
) -> docket_core::DocumentAggregate {
    let command = Command::create(
        "req-create",
        alice(),
        "invoice",
        obj(fields),
        lines.into_iter().map(obj).collect(),
    );
    match service.execute(command).await.expect("create failed") {
        CommandOutput::Created { document } => document,
        other => panic!("unexpected output {:?}", other),
    }
}

#[tokio::test]
async fn test_create_invoice_with_lines() {
    let service = sqlite_service().await;

    let created = create_invoice(
        &service,
        json!({"note": "sample", "payable_amount": 200.0}),
        vec![json!({"line_extension_amount": 200.0, "item_id": 7})],
    )
    .await;

    let header = &created.header;
    assert_eq!(header.id.to_string().len(), 36);
    assert_eq!(header.field("note").unwrap(), "sample");
    assert_eq!(header.field("payable_amount").unwrap(), 200.0);
    assert_eq!(header.status_code, "active");
    assert_eq!(header.created_by_user_id, ALICE_ID);
    assert_eq!(header.updated_by_user_id, ALICE_ID);
    assert_eq!(header.created_at, header.updated_at);

    assert_eq!(created.lines.len(), 1);
    let line = &created.lines[0];
    assert_eq!(line.field("item_id").unwrap(), 7);
    assert_eq!(line.field("line_extension_amount").unwrap(), 200.0);
    assert_eq!(line.header_internal_id, Some(header.internal_id));
    assert_eq!(line.created_by_user_id, ALICE_ID);

    let fetched = service
        .get_by_external_id("invoice", &header.id.to_string(), true)
        .await
        .unwrap();
    assert_eq!(fetched.header.id, header.id);
    assert_eq!(fetched.header.internal_id, header.internal_id);
    assert_eq!(fetched.header.fields, header.fields);
    assert_eq!(fetched.lines.len(), 1);
    assert_eq!(fetched.lines[0].id, line.id);
    assert_eq!(fetched.lines[0].field("item_id").unwrap(), 7);
}

#[tokio::test]
async fn test_lines_keep_insertion_order() {
    let service = sqlite_service().await;

    let created = create_invoice(
        &service,
        json!({"note": "two lines"}),
        vec![json!({"item_id": 1}), json!({"item_id": 2})],
    )
    .await;
    assert_eq!(created.lines.len(), 2);
    assert_ne!(created.lines[0].id, created.lines[1].id);

    let fetched = service
        .get_by_external_id("invoice", &created.header.id.to_string(), true)
        .await
        .unwrap();
    let fetched_ids: Vec<_> = fetched.lines.iter().map(|l| l.id).collect();
    let created_ids: Vec<_> = created.lines.iter().map(|l| l.id).collect();
    assert_eq!(fetched_ids, created_ids);
    assert_eq!(fetched.lines[1].field("item_id").unwrap(), 2);
}

#[tokio::test]
async fn test_response_serialization_hides_internal_ids() {
    let service = sqlite_service().await;
    let created = create_invoice(&service, json!({"note": "wire"}), vec![json!({"item_id": 3})]).await;

    let wire = serde_json::to_value(&created).unwrap();
    assert_eq!(wire["header"]["id"], created.header.id.to_string());
    assert_eq!(wire["header"]["note"], "wire");
    assert!(wire["header"].get("internal_id").is_none());
    assert!(wire["lines"][0].get("header_internal_id").is_none());
    assert_eq!(wire["lines"][0]["item_id"], 3);
}

#[tokio::test]
async fn test_update_overwrites_header_and_keeps_id() {
    let service = sqlite_service().await;
    let created = create_invoice(&service, json!({"note": "draft", "payable_amount": 10.0}), vec![]).await;
    let id = created.header.id.to_string();

    let output = service
        .execute(Command::update(
            "req-update",
            bob(),
            "invoice",
            id.clone(),
            obj(json!({"note": "Ordered", "payable_amount": 400.0})),
        ))
        .await
        .unwrap();
    assert_eq!(
        output,
        CommandOutput::Updated {
            message: UPDATED_SUCCESSFULLY.to_string()
        }
    );

    let fetched = service.get_by_external_id("invoice", &id, false).await.unwrap();
    assert_eq!(fetched.header.id, created.header.id);
    assert_eq!(fetched.header.internal_id, created.header.internal_id);
    assert_eq!(fetched.header.field("note").unwrap(), "Ordered");
    assert_eq!(fetched.header.field("payable_amount").unwrap(), 400.0);
    assert_eq!(fetched.header.created_by_user_id, ALICE_ID);
    assert_eq!(fetched.header.updated_by_user_id, BOB_ID);
    assert_eq!(fetched.header.created_at, created.header.created_at);
    assert!(fetched.header.updated_at >= created.header.updated_at);
}

#[tokio::test]
async fn test_update_missing_document_is_not_found() {
    let service = sqlite_service().await;
    let missing = ExternalId::generate().to_string();

    let err = service
        .execute(Command::update(
            "req-missing",
            alice(),
            "invoice",
            missing.clone(),
            obj(json!({"note": "nobody home"})),
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DocketError::NotFound {
            entity: "invoice".to_string(),
            id: missing,
        }
    );
}

#[tokio::test]
async fn test_update_rejects_immutable_field() {
    let service = sqlite_service().await;
    let created = create_invoice(&service, json!({"note": "draft"}), vec![]).await;

    let err = service
        .execute(Command::update(
            "req-immutable",
            alice(),
            "invoice",
            created.header.id.to_string(),
            obj(json!({"supplier_party_id": "other"})),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_FIELD");
}

#[tokio::test]
async fn test_unresolvable_actor_writes_nothing() {
    let service = sqlite_service().await;

    let err = service
        .execute(Command::create(
            "req-stranger",
            stranger(),
            "invoice",
            obj(json!({"note": "sneaky"})),
            vec![obj(json!({"item_id": 1}))],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, DocketError::ActorResolutionFailed { .. }));

    let page = service.list("invoice", None, None).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.next_cursor, END_OF_PAGES);
}

#[tokio::test]
async fn test_invalid_line_writes_nothing() {
    let service = sqlite_service().await;

    let err = service
        .execute(Command::create(
            "req-bad-line",
            alice(),
            "invoice",
            obj(json!({"note": "half"})),
            vec![
                obj(json!({"item_id": 1})),
                obj(json!({"item_id": 2, "tax_point_date": "not a date"})),
            ],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, DocketError::InvalidDateField { ref field, .. } if field == "tax_point_date"));

    assert!(service.list("invoice", None, None).await.unwrap().items.is_empty());
}

#[tokio::test]
async fn test_lines_rejected_for_header_only_entity() {
    let service = sqlite_service().await;

    let err = service
        .execute(Command::create(
            "req-scheme",
            alice(),
            "tax_scheme",
            obj(json!({"tax_scheme_code": "VAT"})),
            vec![obj(json!({"item_id": 1}))],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, DocketError::InvalidField { ref field, .. } if field == "lines"));
}

#[tokio::test]
async fn test_unknown_entity_and_bad_identifier() {
    let service = sqlite_service().await;

    let err = service
        .get_by_external_id("purchase_order", &ExternalId::generate().to_string(), false)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "UNKNOWN_ENTITY");

    let err = service
        .get_by_external_id("invoice", "not-a-uuid", false)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_IDENTIFIER");
}

#[tokio::test]
async fn test_pagination_visits_every_row_once() {
    let service = sqlite_service().await;
    for n in 0..25 {
        create_invoice(&service, json!({"note": format!("invoice {}", n)}), vec![]).await;
    }

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;
    loop {
        let page = service
            .list("invoice", cursor.as_deref(), Some(10))
            .await
            .unwrap();
        pages += 1;
        seen.extend(page.items.iter().map(|r| r.internal_id));
        if !page.has_more() {
            break;
        }
        cursor = Some(page.next_cursor);
        assert!(pages < 10, "pagination did not terminate");
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 25);
    assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 25);
    assert!(seen.windows(2).all(|w| w[0] > w[1]));
}

#[tokio::test]
async fn test_pagination_exact_multiple_ends_with_sentinel() {
    let service = sqlite_service().await;
    for _ in 0..4 {
        create_invoice(&service, json!({}), vec![]).await;
    }

    let first = service.list("invoice", None, Some(2)).await.unwrap();
    assert_eq!(first.items.len(), 2);
    assert!(first.has_more());

    let second = service
        .list("invoice", Some(first.next_cursor.as_str()), Some(2))
        .await
        .unwrap();
    assert_eq!(second.items.len(), 2);

    let third = service
        .list("invoice", Some(second.next_cursor.as_str()), Some(2))
        .await
        .unwrap();
    assert!(third.items.is_empty());
    assert_eq!(third.next_cursor, END_OF_PAGES);

    let sentinel = service.list("invoice", Some(END_OF_PAGES), None).await.unwrap();
    assert!(sentinel.items.is_empty());
    assert_eq!(sentinel.next_cursor, END_OF_PAGES);
}

#[tokio::test]
async fn test_list_limit_is_clamped_and_cursor_validated() {
    let service = sqlite_service().await;
    for _ in 0..3 {
        create_invoice(&service, json!({}), vec![]).await;
    }

    let page = service.list("invoice", None, Some(0)).await.unwrap();
    assert_eq!(page.items.len(), 1);

    let err = service
        .list("invoice", Some("!!not-a-cursor!!"), None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CURSOR");
}

#[tokio::test]
async fn test_child_lines() {
    let service = sqlite_service().await;
    let created = create_invoice(
        &service,
        json!({"note": "with lines"}),
        vec![json!({"item_id": 5}), json!({"item_id": 6}), json!({"item_id": 7})],
    )
    .await;

    let lines = service
        .child_lines("invoice", &created.header.id.to_string())
        .await
        .unwrap();
    let items: Vec<_> = lines.iter().map(|l| l.field("item_id").cloned()).collect();
    assert_eq!(items, vec![Some(json!(5)), Some(json!(6)), Some(json!(7))]);
    assert!(lines.windows(2).all(|w| w[0].internal_id < w[1].internal_id));

    let err = service
        .child_lines("invoice", &ExternalId::generate().to_string())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_get_by_internal_id() {
    let service = sqlite_service().await;
    let created = create_invoice(&service, json!({"note": "internal"}), vec![]).await;

    let record = service
        .get_by_internal_id("invoice", created.header.internal_id)
        .await
        .unwrap();
    assert_eq!(record.id, created.header.id);

    let err = service.get_by_internal_id("invoice", 9_999).await.unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_query_dispatch() {
    let service = sqlite_service().await;
    let created = create_invoice(&service, json!({"note": "q"}), vec![json!({"item_id": 1})]).await;
    let id = created.header.id.to_string();

    match service
        .query(DocumentQuery::Get {
            entity: "invoice".to_string(),
            id: id.clone(),
            include_lines: true,
        })
        .await
        .unwrap()
    {
        QueryOutput::Document { document } => assert_eq!(document.lines.len(), 1),
        other => panic!("unexpected output {:?}", other),
    }

    match service
        .query(DocumentQuery::List {
            entity: "invoice".to_string(),
            cursor: None,
            limit: None,
        })
        .await
        .unwrap()
    {
        QueryOutput::Page { page } => {
            assert_eq!(page.items.len(), 1);
            assert_eq!(page.next_cursor, END_OF_PAGES);
        }
        other => panic!("unexpected output {:?}", other),
    }

    match service
        .query(DocumentQuery::Lines {
            entity: "invoice".to_string(),
            id,
        })
        .await
        .unwrap()
    {
        QueryOutput::Lines { lines } => assert_eq!(lines.len(), 1),
        other => panic!("unexpected output {:?}", other),
    }
}

#[tokio::test]
async fn test_logistics_document_round_trip() {
    let service = sqlite_service().await;

    let output = service
        .execute(Command::create(
            "req-despatch",
            alice(),
            "despatch_advice",
            obj(json!({"note": "truck 4", "issue_date": "2024-05-01"})),
            vec![obj(json!({"item_id": 9, "delivered_quantity": 12.5}))],
        ))
        .await
        .unwrap();
    let CommandOutput::Created { document } = output else {
        panic!("expected a created document");
    };
    assert_eq!(
        document.header.field("issue_date").unwrap(),
        "2024-05-01T00:00:00+00:00"
    );

    let fetched = service
        .get_by_external_id("despatch_advice", &document.header.id.to_string(), true)
        .await
        .unwrap();
    assert_eq!(fetched.header.field("issue_date"), document.header.field("issue_date"));
    assert_eq!(fetched.lines[0].field("delivered_quantity").unwrap(), 12.5);
}
