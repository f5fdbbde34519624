use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::db::{
    CreateTable, DeleteRows, InsertRows, RowCursor, SqlExecutor, Statement, TableQuery, Value,
};
use crate::errors::DbError;

/// A request seen by [`RecordingExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Execute(Statement),
    Query(TableQuery),
    Insert(InsertRows),
    Delete(DeleteRows),
    CreateTable(CreateTable),
}

impl Recorded {
    /// MySQL rendering of the request.
    pub fn to_statement(&self) -> Statement {
        match self {
            Recorded::Execute(stmt) => stmt.clone(),
            Recorded::Query(query) => query.to_statement(),
            Recorded::Insert(insert) => insert.to_statement(),
            Recorded::Delete(delete) => delete.to_statement(),
            Recorded::CreateTable(create) => create.to_statement(),
        }
    }
}

#[derive(Debug)]
enum Reply {
    Rows(RowCursor),
    Affected(u64),
    Fail(String),
}

/// In-memory execution provider that logs every request and answers from
/// a scripted queue.
///
/// Replies are consumed in order, one per request. With an empty queue a
/// query returns no rows, an insert reports one affected row per inserted
/// row, table creation reports none and every other call reports one
/// affected row.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    log: Mutex<Vec<Recorded>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rows<C, S>(&self, columns: C, rows: Vec<Vec<Value>>) -> &Self
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies
            .lock()
            .push_back(Reply::Rows(RowCursor::new(columns, rows)));
        self
    }

    /// Queues the reply to a `COUNT(1)` query.
    pub fn push_count(&self, count: i64) -> &Self {
        self.push_rows(["COUNT(1)"], vec![vec![Value::BigInt(count)]])
    }

    pub fn push_affected(&self, rows: u64) -> &Self {
        self.replies.lock().push_back(Reply::Affected(rows));
        self
    }

    pub fn push_error(&self, message: impl Into<String>) -> &Self {
        self.replies.lock().push_back(Reply::Fail(message.into()));
        self
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.log.lock().clone()
    }

    /// Rendered SQL of every request, in arrival order.
    pub fn sql_log(&self) -> Vec<String> {
        self.log
            .lock()
            .iter()
            .map(|r| r.to_statement().sql)
            .collect()
    }

    pub fn last(&self) -> Option<Recorded> {
        self.log.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
        self.replies.lock().clear();
    }

    fn record(&self, request: Recorded) -> Option<Reply> {
        self.log.lock().push(request);
        self.replies.lock().pop_front()
    }

    fn affected(&self, request: Recorded, default: u64) -> Result<u64, DbError> {
        match self.record(request) {
            None => Ok(default),
            Some(Reply::Affected(rows)) => Ok(rows),
            Some(Reply::Rows(cursor)) => Ok(cursor.remaining() as u64),
            Some(Reply::Fail(message)) => Err(DbError::Statement(message)),
        }
    }
}

impl SqlExecutor for RecordingExecutor {
    async fn execute(&self, statement: Statement) -> Result<u64, DbError> {
        self.affected(Recorded::Execute(statement), 1)
    }

    async fn query(&self, query: TableQuery) -> Result<RowCursor, DbError> {
        match self.record(Recorded::Query(query)) {
            None | Some(Reply::Affected(_)) => Ok(RowCursor::empty()),
            Some(Reply::Rows(cursor)) => Ok(cursor),
            Some(Reply::Fail(message)) => Err(DbError::Statement(message)),
        }
    }

    async fn insert(&self, insert: InsertRows) -> Result<u64, DbError> {
        let rows = insert.rows.len() as u64;
        self.affected(Recorded::Insert(insert), rows)
    }

    async fn delete(&self, delete: DeleteRows) -> Result<u64, DbError> {
        self.affected(Recorded::Delete(delete), 1)
    }

    async fn create_table(&self, create: CreateTable) -> Result<u64, DbError> {
        self.affected(Recorded::CreateTable(create), 0)
    }
}
