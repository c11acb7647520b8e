// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Row codec and `DocumentStore` impl shared by the sqlx backends.
//!
//! The backends differ only in their sqlx types, their schema dialect and
//! how they open a transaction. `sqlx_document_store!` expands inside a
//! backend module that defines `run_in_transaction` over its pool, for a
//! store with a `pool` field.

macro_rules! sqlx_document_store {
    (
        store: $store:ident,
        dialect: $dialect:ident,
        database: $db:ty,
        query: $query:ident,
        connection: $conn:ty,
        row: $row:ty $(,)?
    ) => {
        fn bind_field<'q>(
            query: $query<'q>,
            kind: $crate::descriptor::ColumnKind,
            value: &$crate::record::FieldValue,
        ) -> $query<'q> {
            use $crate::descriptor::ColumnKind;
            match kind {
                ColumnKind::Text => query.bind(value.text()),
                ColumnKind::Integer => query.bind(value.integer()),
                ColumnKind::Decimal => query.bind(value.decimal()),
                ColumnKind::Boolean => query.bind(value.boolean()),
                ColumnKind::Timestamp => query.bind(value.timestamp()),
            }
        }

        async fn insert_row(
            conn: &mut $conn,
            statement: &str,
            spec: &$crate::descriptor::TableSpec,
            row: &$crate::record::NewRow,
            header_id: Option<i64>,
        ) -> $crate::error::Result<i64> {
            use $crate::error::DocketError;
            let mut query = ::sqlx::query(statement).bind(row.uuid.as_bytes().to_vec());
            for column in &spec.columns {
                query = bind_field(
                    query,
                    column.kind,
                    $crate::record::lookup(&row.values, &column.name),
                );
            }
            if let Some(header_id) = header_id {
                query = query.bind(header_id);
            }
            let inserted = query
                .bind(row.audit.status_code.clone())
                .bind(row.audit.created_by_user_id)
                .bind(row.audit.updated_by_user_id)
                .bind(row.audit.created_at)
                .bind(row.audit.updated_at)
                .fetch_one(&mut *conn)
                .await
                .map_err(DocketError::transaction)?;
            ::sqlx::Row::try_get(&inserted, "id").map_err(DocketError::transaction)
        }

        fn column<'r, T>(row: &'r $row, name: &str) -> $crate::error::Result<T>
        where
            T: ::sqlx::Decode<'r, $db> + ::sqlx::Type<$db>,
        {
            ::sqlx::Row::try_get(row, name)
                .map_err(|e| $crate::error::DocketError::database("decode_row", e))
        }

        fn decode_record(
            row: &$row,
            spec: &$crate::descriptor::TableSpec,
            is_line: bool,
        ) -> $crate::error::Result<$crate::record::DocumentRecord> {
            use ::chrono::{DateTime, Utc};
            use $crate::descriptor::ColumnKind;
            use $crate::record::FieldValue;

            let uuid: Vec<u8> = column(row, "uuid")?;
            let mut fields = ::serde_json::Map::new();
            for spec_column in &spec.columns {
                let name = spec_column.name.as_str();
                let value = match spec_column.kind {
                    ColumnKind::Text => column::<Option<String>>(row, name)?.map(FieldValue::Text),
                    ColumnKind::Integer => {
                        column::<Option<i64>>(row, name)?.map(FieldValue::Integer)
                    }
                    ColumnKind::Decimal => {
                        column::<Option<f64>>(row, name)?.map(FieldValue::Decimal)
                    }
                    ColumnKind::Boolean => {
                        column::<Option<bool>>(row, name)?.map(FieldValue::Boolean)
                    }
                    ColumnKind::Timestamp => {
                        column::<Option<DateTime<Utc>>>(row, name)?.map(FieldValue::Timestamp)
                    }
                };
                fields.insert(
                    spec_column.name.clone(),
                    value.unwrap_or(FieldValue::Null).to_json(),
                );
            }
            Ok($crate::record::DocumentRecord {
                internal_id: column(row, "id")?,
                header_internal_id: if is_line {
                    Some(column(row, "header_id")?)
                } else {
                    None
                },
                id: $crate::ids::ExternalId::from_slice(&uuid)?,
                fields,
                status_code: column(row, "status_code")?,
                created_by_user_id: column(row, "created_by_user_id")?,
                updated_by_user_id: column(row, "updated_by_user_id")?,
                created_at: column(row, "created_at")?,
                updated_at: column(row, "updated_at")?,
            })
        }

        #[::async_trait::async_trait]
        impl $crate::persistence::DocumentStore for $store {
            fn dialect(&self) -> $crate::persistence::sql::Dialect {
                $crate::persistence::sql::Dialect::$dialect
            }

            async fn ensure_schema(
                &self,
                descriptor: &$crate::descriptor::EntityDescriptor,
            ) -> $crate::error::Result<()> {
                use $crate::persistence::sql::{self, Dialect};

                let mut statements = sql::create_table(Dialect::$dialect, &descriptor.header, None);
                if let Some(lines) = &descriptor.lines {
                    statements.extend(sql::create_table(
                        Dialect::$dialect,
                        lines,
                        Some(&descriptor.header.table),
                    ));
                }
                for statement in statements {
                    ::sqlx::query(&statement)
                        .execute(&self.pool)
                        .await
                        .map_err(|e| $crate::error::DocketError::database("ensure_schema", e))?;
                }
                ::tracing::debug!(entity = %descriptor.name, "Schema ready");
                Ok(())
            }

            async fn insert_document(
                &self,
                descriptor: &$crate::descriptor::EntityDescriptor,
                header: &$crate::record::NewRow,
                lines: &[$crate::record::NewRow],
            ) -> $crate::error::Result<$crate::persistence::InsertedIds> {
                use $crate::persistence::{InsertedIds, line_spec, sql};

                let header_spec = descriptor.header.clone();
                let lines_spec = if lines.is_empty() {
                    None
                } else {
                    Some(line_spec(descriptor)?.clone())
                };
                let header = header.clone();
                let lines = lines.to_vec();

                let ids = run_in_transaction(&self.pool, move |conn| {
                    Box::pin(async move {
                        let header_sql = sql::insert(&header_spec, false);
                        let header_id =
                            insert_row(conn, &header_sql, &header_spec, &header, None).await?;

                        let mut line_ids = Vec::with_capacity(lines.len());
                        if let Some(spec) = &lines_spec {
                            let line_sql = sql::insert(spec, true);
                            for line in &lines {
                                line_ids.push(
                                    insert_row(conn, &line_sql, spec, line, Some(header_id))
                                        .await?,
                                );
                            }
                        }
                        Ok(InsertedIds {
                            header_id,
                            line_ids,
                        })
                    })
                })
                .await?;

                ::tracing::debug!(
                    entity = %descriptor.name,
                    header_id = ids.header_id,
                    lines = ids.line_ids.len(),
                    "Inserted document"
                );
                Ok(ids)
            }

            async fn update_header(
                &self,
                descriptor: &$crate::descriptor::EntityDescriptor,
                id: &$crate::ids::ExternalId,
                values: &[(String, $crate::record::FieldValue)],
                actor: i64,
                now: ::chrono::DateTime<::chrono::Utc>,
            ) -> $crate::error::Result<u64> {
                use $crate::error::DocketError;
                use $crate::persistence::sql;
                use $crate::record::lookup;

                let spec = descriptor.header.clone();
                let values = values.to_vec();
                let uuid = id.as_bytes().to_vec();

                run_in_transaction(&self.pool, move |conn| {
                    Box::pin(async move {
                        let statement = sql::update(&spec);
                        let mut query = ::sqlx::query(&statement);
                        for column in spec.mutable_columns() {
                            query = bind_field(query, column.kind, lookup(&values, &column.name));
                        }
                        let result = query
                            .bind(actor)
                            .bind(now)
                            .bind(uuid)
                            .execute(&mut *conn)
                            .await
                            .map_err(DocketError::transaction)?;
                        Ok(result.rows_affected())
                    })
                })
                .await
            }

            async fn find_header(
                &self,
                descriptor: &$crate::descriptor::EntityDescriptor,
                id: &$crate::ids::ExternalId,
            ) -> $crate::error::Result<Option<$crate::record::DocumentRecord>> {
                let statement = $crate::persistence::sql::select_by_uuid(&descriptor.header);
                let row = ::sqlx::query(&statement)
                    .bind(id.as_bytes().to_vec())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| $crate::error::DocketError::database("find_header", e))?;
                row.map(|r| decode_record(&r, &descriptor.header, false))
                    .transpose()
            }

            async fn find_header_by_internal_id(
                &self,
                descriptor: &$crate::descriptor::EntityDescriptor,
                internal_id: i64,
            ) -> $crate::error::Result<Option<$crate::record::DocumentRecord>> {
                let statement = $crate::persistence::sql::select_by_id(&descriptor.header);
                let row = ::sqlx::query(&statement)
                    .bind(internal_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| {
                        $crate::error::DocketError::database("find_header_by_internal_id", e)
                    })?;
                row.map(|r| decode_record(&r, &descriptor.header, false))
                    .transpose()
            }

            async fn list_headers(
                &self,
                descriptor: &$crate::descriptor::EntityDescriptor,
                watermark: Option<i64>,
                limit: i64,
            ) -> $crate::error::Result<Vec<$crate::record::DocumentRecord>> {
                let statement = $crate::persistence::sql::list(&descriptor.header, watermark.is_some());
                let mut query = ::sqlx::query(&statement);
                if let Some(watermark) = watermark {
                    query = query.bind(watermark);
                }
                let rows = query
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| $crate::error::DocketError::database("list_headers", e))?;
                rows.iter()
                    .map(|r| decode_record(r, &descriptor.header, false))
                    .collect()
            }

            async fn list_lines(
                &self,
                descriptor: &$crate::descriptor::EntityDescriptor,
                header_id: i64,
            ) -> $crate::error::Result<Vec<$crate::record::DocumentRecord>> {
                let spec = $crate::persistence::line_spec(descriptor)?;
                let statement = $crate::persistence::sql::lines_of(spec);
                let rows = ::sqlx::query(&statement)
                    .bind(header_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| $crate::error::DocketError::database("list_lines", e))?;
                rows.iter().map(|r| decode_record(r, spec, true)).collect()
            }
        }
    };
}
