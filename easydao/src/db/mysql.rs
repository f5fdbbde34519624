use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::conf::DaoConf;
use crate::db::executor::{
    CreateTable, DeleteRows, InsertRows, RowCursor, SqlExecutor, Statement, TableQuery,
};
use crate::db::value::Value;
use crate::errors::DbError;

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// Execution provider backed by a sqlx MySQL pool.
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(conf: &DaoConf) -> Result<Self, DbError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(conf.max_connections)
            .connect(&conf.database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn run(&self, statement: Statement) -> Result<u64, DbError> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "execute");
        let query = bind_all(sqlx::query(&statement.sql), statement.params);
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn bind_all<'q>(mut query: MySqlQuery<'q>, params: Vec<Value>) -> MySqlQuery<'q> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(v),
            Value::Int(v) => query.bind(v),
            Value::BigInt(v) => query.bind(v),
            Value::Float(v) => query.bind(v),
            Value::Double(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
            Value::Bytes(v) => query.bind(v),
            Value::Timestamp(v) => query.bind(v),
            Value::DateTime(v) => query.bind(v),
        };
    }
    query
}

fn decode_row(row: &MySqlRow) -> Result<Vec<Value>, DbError> {
    (0..row.columns().len())
        .map(|idx| decode_cell(row, idx))
        .collect()
}

fn decode_cell(row: &MySqlRow, idx: usize) -> Result<Value, DbError> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();
    let fail = |e: sqlx::Error| DbError::Mapping {
        field: row.columns()[idx].name().to_string(),
        reason: e.to_string(),
    };

    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get_unchecked(idx).map_err(fail)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" => {
            let v: i64 = row.try_get_unchecked(idx).map_err(fail)?;
            i32::try_from(v).map_or(Value::BigInt(v), Value::Int)
        }
        "BIGINT" => Value::BigInt(row.try_get_unchecked(idx).map_err(fail)?),
        name if name.ends_with("UNSIGNED") => {
            let v: u64 = row.try_get_unchecked(idx).map_err(fail)?;
            match i64::try_from(v) {
                Ok(v) => Value::BigInt(v),
                Err(_) => Value::Text(v.to_string()),
            }
        }
        "FLOAT" => Value::Float(row.try_get_unchecked(idx).map_err(fail)?),
        "DOUBLE" => Value::Double(row.try_get_unchecked(idx).map_err(fail)?),
        "DATETIME" => Value::Timestamp(row.try_get_unchecked::<NaiveDateTime, _>(idx).map_err(fail)?),
        "TIMESTAMP" => {
            Value::DateTime(row.try_get_unchecked::<DateTime<Utc>, _>(idx).map_err(fail)?)
        }
        "DATE" => {
            let date: NaiveDate = row.try_get_unchecked(idx).map_err(fail)?;
            Value::Timestamp(date.and_time(NaiveTime::MIN))
        }
        "TIME" => {
            let time: NaiveTime = row.try_get_unchecked(idx).map_err(fail)?;
            Value::Text(time.to_string())
        }
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT" => {
            Value::Bytes(row.try_get_unchecked(idx).map_err(fail)?)
        }
        _ => match row.try_get_unchecked::<String, _>(idx) {
            Ok(text) => Value::Text(text),
            Err(_) => Value::Bytes(row.try_get_unchecked(idx).map_err(fail)?),
        },
    };
    Ok(value)
}

impl SqlExecutor for MySqlExecutor {
    async fn execute(&self, statement: Statement) -> Result<u64, DbError> {
        self.run(statement).await
    }

    async fn query(&self, query: TableQuery) -> Result<RowCursor, DbError> {
        let statement = query.to_statement();
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "query");
        let rows = bind_all(sqlx::query(&statement.sql), statement.params)
            .fetch_all(&self.pool)
            .await?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let values = rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
        Ok(RowCursor::new(columns, values))
    }

    async fn insert(&self, insert: InsertRows) -> Result<u64, DbError> {
        self.run(insert.to_statement()).await
    }

    async fn delete(&self, delete: DeleteRows) -> Result<u64, DbError> {
        self.run(delete.to_statement()).await
    }

    async fn create_table(&self, create: CreateTable) -> Result<u64, DbError> {
        self.run(create.to_statement()).await
    }
}
