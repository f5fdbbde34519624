use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;

use crate::conf::DaoConf;
use crate::db::executor::{
    ColumnDefinition, CreateTable, DeleteRows, IndexDefinition, InsertRows, SqlExecutor,
    Statement, TableQuery,
};
use crate::db::interfaces::Entity;
use crate::db::mapper::RowMapper;
use crate::db::models::{TableDescriptor, quote_literal};
use crate::db::page::PageResult;
use crate::db::query::QueryWrapper;
use crate::db::registry::MetadataRegistry;
use crate::db::value::{FieldKind, Value};
use crate::errors::{DbError, DbResult};

/// Generic data access object for one entity type.
///
/// Each plain operation catches every fault, logs it and returns an empty,
/// zero or `false` result. The `try_` variant of an operation returns the
/// same value on success and the fault otherwise.
pub struct CrudEngine<E, X> {
    registry: Arc<MetadataRegistry>,
    table: Arc<TableDescriptor>,
    executor: X,
    batch_size: Option<usize>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, X: SqlExecutor> CrudEngine<E, X> {
    /// Resolves `E`'s table through `registry`. Metadata faults surface here.
    pub fn new(registry: &Arc<MetadataRegistry>, executor: X) -> DbResult<Self> {
        let table = registry.resolve::<E>()?;
        Ok(Self {
            registry: registry.clone(),
            table,
            executor,
            batch_size: None,
            _entity: PhantomData,
        })
    }

    /// Like [`CrudEngine::new`], then applies `conf`: creates the table when
    /// `create_table` is set and adopts the configured batch size.
    pub async fn open(
        registry: &Arc<MetadataRegistry>,
        executor: X,
        conf: &DaoConf,
    ) -> DbResult<Self> {
        let mut engine = Self::new(registry, executor)?;
        engine.batch_size = conf.batch_size.filter(|n| *n > 0);
        if conf.create_table {
            engine.try_create_table_with(conf.drop_if_exists).await?;
        }
        Ok(engine)
    }

    /// Chunk size applied by [`CrudEngine::insert_batch`].
    pub fn with_batch_size(mut self, rows: usize) -> Self {
        self.batch_size = Some(rows).filter(|n| *n > 0);
        self
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    pub fn table(&self) -> &Arc<TableDescriptor> {
        &self.table
    }

    pub fn query(&self) -> QueryWrapper<E> {
        QueryWrapper::new(self.table.clone())
    }

    fn log_fault(&self, operation: &'static str, err: &DbError) {
        tracing::error!(
            operation,
            table = %self.table.name,
            code = err.code(),
            "{operation} failed: {err}"
        );
    }

    fn soft<T: Default>(&self, operation: &'static str, result: DbResult<T>) -> T {
        result.unwrap_or_else(|err| {
            self.log_fault(operation, &err);
            T::default()
        })
    }

    // reads

    pub async fn try_select_list(&self, wrapper: QueryWrapper<E>) -> DbResult<Vec<E>> {
        wrapper.check()?;
        let query = TableQuery {
            table: self.table.name.clone(),
            filter: wrapper.render(),
            columns: Vec::new(),
            order: wrapper.order().cloned(),
            range: wrapper.effective_range(),
        };
        let mut cursor = self.executor.query(query).await?;
        RowMapper::map_all(&self.table, &mut cursor)
    }

    pub async fn select_list(&self, wrapper: QueryWrapper<E>) -> Vec<E> {
        self.soft("select_list", self.try_select_list(wrapper).await)
    }

    pub async fn try_select_one(&self, wrapper: QueryWrapper<E>) -> DbResult<Option<E>> {
        let rows = self.try_select_list(wrapper.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn select_one(&self, wrapper: QueryWrapper<E>) -> Option<E> {
        self.soft("select_one", self.try_select_one(wrapper).await)
    }

    pub async fn try_select_by_id(&self, id: impl Into<Value>) -> DbResult<Option<E>> {
        let wrapper = self.query().eq(self.table.primary_key.as_str(), id);
        self.try_select_one(wrapper).await
    }

    pub async fn select_by_id(&self, id: impl Into<Value>) -> Option<E> {
        self.soft("select_by_id", self.try_select_by_id(id).await)
    }

    pub async fn try_select_all(&self) -> DbResult<Vec<E>> {
        self.try_select_list(self.query()).await
    }

    pub async fn select_all(&self) -> Vec<E> {
        self.soft("select_all", self.try_select_all().await)
    }

    /// Counts matching rows; ordering and paging are ignored.
    pub async fn try_count(&self, wrapper: QueryWrapper<E>) -> DbResult<u64> {
        wrapper.check()?;
        let mut query = TableQuery::new(self.table.name.clone());
        query.filter = wrapper.render();
        query.columns = vec!["COUNT(1)".to_string()];
        let mut cursor = self.executor.query(query).await?;
        let count = cursor
            .next()
            .and_then(|row| row.values().first().and_then(Value::as_i64))
            .and_then(|n| u64::try_from(n).ok());
        count.ok_or_else(|| DbError::Mapping {
            field: "COUNT(1)".to_string(),
            reason: "count projection did not return a non-negative integer".to_string(),
        })
    }

    pub async fn count(&self, wrapper: QueryWrapper<E>) -> u64 {
        self.soft("count", self.try_count(wrapper).await)
    }

    pub async fn try_paginate(
        &self,
        page_number: u64,
        page_size: u64,
        wrapper: QueryWrapper<E>,
    ) -> DbResult<PageResult<E>> {
        wrapper.clone().page(page_number, page_size).check()?;
        let total = self.try_count(wrapper.clone()).await?;
        self.try_paginate_with_total(page_number, page_size, total, wrapper)
            .await
    }

    pub async fn paginate(
        &self,
        page_number: u64,
        page_size: u64,
        wrapper: QueryWrapper<E>,
    ) -> PageResult<E> {
        if let Err(err) = wrapper.clone().page(page_number, page_size).check() {
            self.log_fault("paginate", &err);
            return PageResult::empty(0, page_number, page_size);
        }
        let total = match self.try_count(wrapper.clone()).await {
            Ok(total) => total,
            Err(err) => {
                self.log_fault("paginate", &err);
                return PageResult::empty(0, page_number, page_size);
            }
        };
        self.paginate_with_total(page_number, page_size, total, wrapper)
            .await
    }

    /// Pages with a known total, skipping the count round trip.
    pub async fn try_paginate_with_total(
        &self,
        page_number: u64,
        page_size: u64,
        total: u64,
        wrapper: QueryWrapper<E>,
    ) -> DbResult<PageResult<E>> {
        let records = self
            .try_select_list(wrapper.page(page_number, page_size))
            .await?;
        Ok(PageResult::new(records, total, page_number, page_size))
    }

    pub async fn paginate_with_total(
        &self,
        page_number: u64,
        page_size: u64,
        total: u64,
        wrapper: QueryWrapper<E>,
    ) -> PageResult<E> {
        match self
            .try_paginate_with_total(page_number, page_size, total, wrapper)
            .await
        {
            Ok(page) => page,
            Err(err) => {
                self.log_fault("paginate", &err);
                PageResult::empty(total, page_number, page_size)
            }
        }
    }

    // inserts

    /// Fills created-at (inserts only) and updated-at fields with the
    /// current time, converted to the field's kind.
    fn stamp_timestamps(&self, entity: &mut E, inserting: bool) {
        let now = Utc::now();
        for column in &self.table.columns {
            if !(column.updated_at || (column.created_at && inserting)) {
                continue;
            }
            let value = match column.kind {
                FieldKind::DateTime => Value::DateTime(now),
                FieldKind::Timestamp => Value::Timestamp(now.naive_utc()),
                FieldKind::BigInt => Value::BigInt(now.timestamp_millis()),
                FieldKind::Text => Value::Text(now.to_rfc3339()),
                other => {
                    tracing::warn!(
                        table = %self.table.name,
                        field = column.field,
                        "cannot stamp a {other:?} field with the current time"
                    );
                    continue;
                }
            };
            if let Err(err) = entity.write_field(column.field, value) {
                tracing::warn!(
                    table = %self.table.name,
                    field = column.field,
                    "failed to stamp timestamp: {err}"
                );
            }
        }
    }

    fn column_values(&self, entity: &E, ignore_nulls: bool, skip_key: bool) -> Vec<(String, Value)> {
        self.table
            .columns
            .iter()
            .filter(|c| !(skip_key && c.primary_key))
            .filter_map(|c| {
                let value = entity.read_field(c.field).unwrap_or(Value::Null);
                if ignore_nulls && value.is_null() {
                    None
                } else {
                    Some((c.name.clone(), value))
                }
            })
            .collect()
    }

    pub async fn try_insert_with(&self, entity: &mut E, ignore_nulls: bool) -> DbResult<bool> {
        self.stamp_timestamps(entity, true);
        let (columns, values): (Vec<_>, Vec<_>) =
            self.column_values(entity, ignore_nulls, false).into_iter().unzip();
        if columns.is_empty() {
            return Err(DbError::validation("no columns to insert"));
        }
        let affected = self
            .executor
            .insert(InsertRows {
                table: self.table.name.clone(),
                columns,
                rows: vec![values],
            })
            .await?;
        Ok(affected > 0)
    }

    pub async fn insert_with(&self, entity: &mut E, ignore_nulls: bool) -> bool {
        self.soft("insert", self.try_insert_with(entity, ignore_nulls).await)
    }

    /// Inserts the non-null mapped fields of `entity`.
    pub async fn try_insert(&self, entity: &mut E) -> DbResult<bool> {
        self.try_insert_with(entity, true).await
    }

    pub async fn insert(&self, entity: &mut E) -> bool {
        self.insert_with(entity, true).await
    }

    pub async fn insert_selective(&self, entity: &mut E) -> bool {
        self.insert_with(entity, true).await
    }

    /// One multi-row insert. The column list comes from the first entity's
    /// non-null fields; later entities bind null where they lack a value.
    async fn try_insert_chunk(&self, entities: &mut [E]) -> DbResult<u64> {
        if entities.is_empty() {
            return Ok(0);
        }
        for entity in entities.iter_mut() {
            self.stamp_timestamps(entity, true);
        }
        let chosen: Vec<_> = self
            .table
            .columns
            .iter()
            .filter(|c| {
                entities[0]
                    .read_field(c.field)
                    .is_some_and(|v| !v.is_null())
            })
            .collect();
        if chosen.is_empty() {
            return Err(DbError::validation("no columns to insert"));
        }
        let rows: Vec<Vec<Value>> = entities
            .iter()
            .map(|entity| {
                chosen
                    .iter()
                    .map(|c| entity.read_field(c.field).unwrap_or(Value::Null))
                    .collect::<Vec<_>>()
            })
            .collect();
        self.executor
            .insert(InsertRows {
                table: self.table.name.clone(),
                columns: chosen.iter().map(|c| c.name.clone()).collect(),
                rows,
            })
            .await
    }

    /// Inserts in chunks of the configured batch size, or as one statement
    /// when none is configured.
    pub async fn try_insert_batch(&self, entities: &mut [E]) -> DbResult<u64> {
        match self.batch_size {
            Some(size) => self.try_insert_batch_chunked(entities, size).await,
            None => self.try_insert_chunk(entities).await,
        }
    }

    pub async fn insert_batch(&self, entities: &mut [E]) -> u64 {
        match self.batch_size {
            Some(size) => self.insert_batch_chunked(entities, size).await,
            None => self.soft("insert_batch", self.try_insert_chunk(entities).await),
        }
    }

    pub async fn try_insert_batch_chunked(
        &self,
        entities: &mut [E],
        chunk_size: usize,
    ) -> DbResult<u64> {
        if chunk_size == 0 {
            return Err(DbError::validation("chunk size must be positive"));
        }
        let mut inserted = 0;
        for chunk in entities.chunks_mut(chunk_size) {
            inserted += self.try_insert_chunk(chunk).await?;
        }
        Ok(inserted)
    }

    /// A failing chunk counts as zero; the other chunks still run.
    pub async fn insert_batch_chunked(&self, entities: &mut [E], chunk_size: usize) -> u64 {
        if chunk_size == 0 {
            self.log_fault(
                "insert_batch",
                &DbError::validation("chunk size must be positive"),
            );
            return 0;
        }
        let mut inserted = 0;
        for chunk in entities.chunks_mut(chunk_size) {
            inserted += self.soft("insert_batch", self.try_insert_chunk(chunk).await);
        }
        inserted
    }

    /// One null-eliding insert per entity; stops at the first fault.
    pub async fn try_insert_batch_selective(&self, entities: &mut [E]) -> DbResult<u64> {
        let mut inserted = 0;
        for entity in entities.iter_mut() {
            if self.try_insert_with(entity, true).await? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// One null-eliding insert per entity, returning how many succeeded.
    pub async fn insert_batch_selective(&self, entities: &mut [E]) -> u64 {
        let mut inserted = 0;
        for entity in entities.iter_mut() {
            if self.insert_selective(entity).await {
                inserted += 1;
            }
        }
        inserted
    }

    // updates

    fn set_clause(sets: &[(String, Value)]) -> String {
        sets.iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub async fn try_update_with(&self, entity: &mut E, ignore_nulls: bool) -> DbResult<bool> {
        self.stamp_timestamps(entity, false);
        let key = self
            .table
            .primary_column()
            .ok_or_else(|| DbError::validation("entity has no primary key column"))?;
        let key_value = entity
            .read_field(key.field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| DbError::validation("primary key value is missing"))?;
        let sets = self.column_values(entity, ignore_nulls, true);
        if sets.is_empty() {
            return Err(DbError::validation("no columns to update"));
        }

        let statement = Statement::new(format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table.name,
            Self::set_clause(&sets),
            self.table.primary_key
        ))
        .bind_all(sets.into_iter().map(|(_, v)| v))
        .bind(key_value);
        Ok(self.executor.execute(statement).await? > 0)
    }

    pub async fn update_with(&self, entity: &mut E, ignore_nulls: bool) -> bool {
        self.soft("update", self.try_update_with(entity, ignore_nulls).await)
    }

    /// Updates the non-null, non-key fields of `entity` by primary key.
    pub async fn try_update(&self, entity: &mut E) -> DbResult<bool> {
        self.try_update_with(entity, true).await
    }

    pub async fn update(&self, entity: &mut E) -> bool {
        self.update_with(entity, true).await
    }

    /// A wrapper without predicates updates every row of the table.
    pub async fn try_update_by_condition_with(
        &self,
        entity: &mut E,
        ignore_nulls: bool,
        wrapper: QueryWrapper<E>,
    ) -> DbResult<u64> {
        wrapper.check()?;
        self.stamp_timestamps(entity, false);
        let sets = self.column_values(entity, ignore_nulls, true);
        if sets.is_empty() {
            return Ok(0);
        }

        let mut sql = format!("UPDATE {} SET {}", self.table.name, Self::set_clause(&sets));
        let filter = wrapper.render();
        if wrapper.has_conditions() {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.sql);
        }
        let statement = Statement::new(sql)
            .bind_all(sets.into_iter().map(|(_, v)| v))
            .bind_all(filter.params);
        self.executor.execute(statement).await
    }

    pub async fn update_by_condition_with(
        &self,
        entity: &mut E,
        ignore_nulls: bool,
        wrapper: QueryWrapper<E>,
    ) -> u64 {
        self.soft(
            "update_by_condition",
            self.try_update_by_condition_with(entity, ignore_nulls, wrapper)
                .await,
        )
    }

    pub async fn try_update_by_condition(
        &self,
        entity: &mut E,
        wrapper: QueryWrapper<E>,
    ) -> DbResult<u64> {
        self.try_update_by_condition_with(entity, true, wrapper).await
    }

    pub async fn update_by_condition(&self, entity: &mut E, wrapper: QueryWrapper<E>) -> u64 {
        self.update_by_condition_with(entity, true, wrapper).await
    }

    /// Updates when the key is set and the row exists, inserts otherwise.
    /// Two statements, not atomic.
    pub async fn try_upsert_with(&self, entity: &mut E, ignore_nulls: bool) -> DbResult<bool> {
        let key_value = self
            .table
            .primary_column()
            .and_then(|key| entity.read_field(key.field))
            .filter(|v| !v.is_null());
        if let Some(id) = key_value {
            if self.try_select_by_id(id).await?.is_some() {
                return self.try_update_with(entity, ignore_nulls).await;
            }
        }
        self.try_insert_with(entity, ignore_nulls).await
    }

    pub async fn upsert_with(&self, entity: &mut E, ignore_nulls: bool) -> bool {
        self.soft("upsert", self.try_upsert_with(entity, ignore_nulls).await)
    }

    /// Writes every mapped field, nulls included.
    pub async fn try_upsert(&self, entity: &mut E) -> DbResult<bool> {
        self.try_upsert_with(entity, false).await
    }

    pub async fn upsert(&self, entity: &mut E) -> bool {
        self.upsert_with(entity, false).await
    }

    pub async fn upsert_selective(&self, entity: &mut E) -> bool {
        self.upsert_with(entity, true).await
    }

    // deletes

    pub async fn try_delete_by_id(&self, id: impl Into<Value>) -> DbResult<bool> {
        let affected = self
            .executor
            .delete(DeleteRows {
                table: self.table.name.clone(),
                column: self.table.primary_key.clone(),
                value: id.into(),
            })
            .await?;
        Ok(affected > 0)
    }

    pub async fn delete_by_id(&self, id: impl Into<Value>) -> bool {
        self.soft("delete_by_id", self.try_delete_by_id(id).await)
    }

    /// One delete per id; stops at the first fault.
    pub async fn try_delete_batch_by_ids<I, V>(&self, ids: I) -> DbResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut deleted = 0;
        for id in ids {
            if self.try_delete_by_id(id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// One delete per id, returning how many removed a row.
    pub async fn delete_batch_by_ids<I, V>(&self, ids: I) -> u64
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut deleted = 0;
        for id in ids {
            if self.delete_by_id(id).await {
                deleted += 1;
            }
        }
        deleted
    }

    /// A wrapper without predicates deletes every row of the table.
    pub async fn try_delete_by_condition(&self, wrapper: QueryWrapper<E>) -> DbResult<u64> {
        wrapper.check()?;
        let mut statement = Statement::new(format!("DELETE FROM {}", self.table.name));
        if wrapper.has_conditions() {
            let filter = wrapper.render();
            statement.sql.push_str(" WHERE ");
            statement.sql.push_str(&filter.sql);
            statement.params = filter.params;
        }
        self.executor.execute(statement).await
    }

    pub async fn delete_by_condition(&self, wrapper: QueryWrapper<E>) -> u64 {
        self.soft("delete_by_condition", self.try_delete_by_condition(wrapper).await)
    }

    // ddl

    pub async fn try_create_table_with(&self, drop_if_exists: bool) -> DbResult<()> {
        let table = &self.table;
        if drop_if_exists {
            let drop = Statement::new(format!("DROP TABLE IF EXISTS {}", table.name));
            if let Err(err) = self.executor.execute(drop).await {
                tracing::debug!(table = %table.name, "drop before create failed: {err}");
            }
        }

        let create = CreateTable {
            table: table.name.clone(),
            columns: table
                .columns
                .iter()
                .map(|c| ColumnDefinition {
                    name: c.name.clone(),
                    definition: c.definition(),
                })
                .collect(),
            indexes: table
                .columns
                .iter()
                .filter_map(|c| {
                    c.index.map(|kind| IndexDefinition {
                        column: c.name.clone(),
                        kind,
                    })
                })
                .collect(),
        };
        self.executor.create_table(create).await?;

        if let Some(comment) = table.comment.as_deref() {
            let alter = Statement::new(format!(
                "ALTER TABLE {} COMMENT {}",
                table.name,
                quote_literal(comment)
            ));
            if let Err(err) = self.executor.execute(alter).await {
                tracing::warn!(table = %table.name, "failed to add table comment: {err}");
            }
        }
        tracing::info!(table = %table.name, "table ready");
        Ok(())
    }

    pub async fn create_table_with(&self, drop_if_exists: bool) -> bool {
        self.try_create_table_with(drop_if_exists)
            .await
            .map(|()| true)
            .unwrap_or_else(|err| {
                self.log_fault("create_table", &err);
                false
            })
    }

    pub async fn try_create_table(&self) -> DbResult<()> {
        self.try_create_table_with(false).await
    }

    pub async fn create_table(&self) -> bool {
        self.create_table_with(false).await
    }
}
