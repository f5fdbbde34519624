#![allow(async_fn_in_trait)]

use std::collections::VecDeque;
use std::sync::Arc;

use crate::db::models::IndexKind;
use crate::db::query::{Filter, OrderBy, PageRange};
use crate::db::value::Value;
use crate::errors::DbError;

/// Parameterized statement text with `?` placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn bind_all(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.params.extend(values);
        self
    }
}

/// Structured single-table read.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    pub table: String,
    pub filter: Filter,
    /// Projected columns; empty selects every column.
    pub columns: Vec<String>,
    pub order: Option<OrderBy>,
    pub range: Option<PageRange>,
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Filter::default(),
            columns: Vec::new(),
            order: None,
            range: None,
        }
    }

    pub fn to_statement(&self) -> Statement {
        let mut sql = String::from("SELECT ");
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.table);
        if !self.filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filter.sql);
        }
        if let Some(order) = &self.order {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.column);
            sql.push_str(if order.ascending { " ASC" } else { " DESC" });
        }
        if let Some(range) = &self.range {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", range.rows(), range.start));
        }
        Statement {
            sql,
            params: self.filter.params.clone(),
        }
    }
}

/// Multi-row insert sharing one column list.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRows {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl InsertRows {
    pub fn to_statement(&self) -> Statement {
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        let tuples = vec![format!("({placeholders})"); self.rows.len()].join(", ");
        Statement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES {}",
                self.table,
                self.columns.join(", "),
                tuples
            ),
            params: self.rows.iter().flatten().cloned().collect(),
        }
    }
}

/// Equality delete on a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRows {
    pub table: String,
    pub column: String,
    pub value: Value,
}

impl DeleteRows {
    pub fn to_statement(&self) -> Statement {
        Statement::new(format!("DELETE FROM {} WHERE {} = ?", self.table, self.column))
            .bind(self.value.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    /// Everything after the column name, e.g. `BIGINT NOT NULL AUTO_INCREMENT`.
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub column: String,
    pub kind: IndexKind,
}

impl IndexDefinition {
    fn to_sql(&self) -> String {
        let prefix = match self.kind {
            IndexKind::Index => "idx",
            IndexKind::Unique => "uk",
        };
        format!(
            "{} {}_{} ({})",
            self.kind.keyword(),
            prefix,
            self.column,
            self.column
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: String,
    pub columns: Vec<ColumnDefinition>,
    pub indexes: Vec<IndexDefinition>,
}

impl CreateTable {
    pub fn to_statement(&self) -> Statement {
        let parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.definition))
            .chain(self.indexes.iter().map(IndexDefinition::to_sql))
            .collect();
        Statement::new(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            parts.join(", ")
        ))
    }
}

/// One result row. Column lookup ignores ASCII case.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Row {
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.index_of(column).and_then(|idx| self.values.get(idx))
    }

    /// Moves a cell out of the row, leaving `Null` behind.
    pub fn take(&mut self, column: &str) -> Option<Value> {
        let idx = self.index_of(column)?;
        self.values.get_mut(idx).map(std::mem::take)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Rows returned by a provider query, consumed front to back.
///
/// Owned by the operation that requested it and released when that
/// operation returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowCursor {
    columns: Arc<Vec<String>>,
    rows: VecDeque<Vec<Value>>,
}

impl RowCursor {
    pub fn new<C, S>(columns: C, rows: Vec<Vec<Value>>) -> Self
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Arc::new(columns.into_iter().map(Into::into).collect()),
            rows: rows.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Iterator for RowCursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.pop_front().map(|values| Row {
            columns: self.columns.clone(),
            values,
        })
    }
}

/// The external execution provider.
///
/// Every call is one round trip. Failures are returned, never retried.
pub trait SqlExecutor {
    async fn execute(&self, statement: Statement) -> Result<u64, DbError>;

    async fn query(&self, query: TableQuery) -> Result<RowCursor, DbError>;

    async fn insert(&self, insert: InsertRows) -> Result<u64, DbError>;

    async fn delete(&self, delete: DeleteRows) -> Result<u64, DbError>;

    async fn create_table(&self, create: CreateTable) -> Result<u64, DbError>;
}

impl<T: SqlExecutor> SqlExecutor for &T {
    async fn execute(&self, statement: Statement) -> Result<u64, DbError> {
        (**self).execute(statement).await
    }

    async fn query(&self, query: TableQuery) -> Result<RowCursor, DbError> {
        (**self).query(query).await
    }

    async fn insert(&self, insert: InsertRows) -> Result<u64, DbError> {
        (**self).insert(insert).await
    }

    async fn delete(&self, delete: DeleteRows) -> Result<u64, DbError> {
        (**self).delete(delete).await
    }

    async fn create_table(&self, create: CreateTable) -> Result<u64, DbError> {
        (**self).create_table(create).await
    }
}

impl<T: SqlExecutor> SqlExecutor for Arc<T> {
    async fn execute(&self, statement: Statement) -> Result<u64, DbError> {
        (**self).execute(statement).await
    }

    async fn query(&self, query: TableQuery) -> Result<RowCursor, DbError> {
        (**self).query(query).await
    }

    async fn insert(&self, insert: InsertRows) -> Result<u64, DbError> {
        (**self).insert(insert).await
    }

    async fn delete(&self, delete: DeleteRows) -> Result<u64, DbError> {
        (**self).delete(delete).await
    }

    async fn create_table(&self, create: CreateTable) -> Result<u64, DbError> {
        (**self).create_table(create).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_statement_shape() {
        let mut query = TableQuery::new("user");
        query.filter = Filter {
            sql: "age > ?".into(),
            params: vec![Value::Int(18)],
        };
        query.order = Some(OrderBy {
            column: "name".into(),
            ascending: false,
        });
        query.range = Some(PageRange { start: 20, end: 29 });
        let stmt = query.to_statement();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM user WHERE age > ? ORDER BY name DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(stmt.params, vec![Value::Int(18)]);
    }

    #[test]
    fn test_count_projection() {
        let mut query = TableQuery::new("user");
        query.columns = vec!["COUNT(1)".into()];
        assert_eq!(query.to_statement().sql, "SELECT COUNT(1) FROM user");
    }

    #[test]
    fn test_multi_row_insert() {
        let insert = InsertRows {
            table: "user".into(),
            columns: vec!["name".into(), "age".into()],
            rows: vec![
                vec![Value::from("a"), Value::Int(1)],
                vec![Value::from("b"), Value::Null],
            ],
        };
        let stmt = insert.to_statement();
        assert_eq!(stmt.sql, "INSERT INTO user (name, age) VALUES (?, ?), (?, ?)");
        assert_eq!(stmt.params.len(), 4);
        assert_eq!(stmt.params[3], Value::Null);
    }

    #[test]
    fn test_create_table_with_indexes() {
        let create = CreateTable {
            table: "user".into(),
            columns: vec![
                ColumnDefinition {
                    name: "id".into(),
                    definition: "BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY".into(),
                },
                ColumnDefinition {
                    name: "email".into(),
                    definition: "VARCHAR(255)".into(),
                },
            ],
            indexes: vec![IndexDefinition {
                column: "email".into(),
                kind: IndexKind::Unique,
            }],
        };
        assert_eq!(
            create.to_statement().sql,
            "CREATE TABLE IF NOT EXISTS user (id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY, \
             email VARCHAR(255), UNIQUE KEY uk_email (email))"
        );
    }

    #[test]
    fn test_row_lookup_ignores_case() {
        let mut cursor = RowCursor::new(["ID", "Name"], vec![vec![Value::BigInt(1), Value::from("x")]]);
        let mut row = cursor.next().unwrap();
        assert_eq!(row.get("id"), Some(&Value::BigInt(1)));
        assert_eq!(row.take("name"), Some(Value::from("x")));
        assert_eq!(row.get("name"), Some(&Value::Null));
        assert!(row.get("age").is_none());
        assert!(cursor.next().is_none());
    }
}
