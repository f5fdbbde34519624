mod dao;
mod executor;
mod interfaces;
mod mapper;
mod models;
#[cfg(feature = "mysql")]
mod mysql;
mod page;
mod query;
mod registry;
mod value;

pub use dao::CrudEngine;
pub use executor::{
    ColumnDefinition, CreateTable, DeleteRows, IndexDefinition, InsertRows, Row, RowCursor,
    SqlExecutor, Statement, TableQuery,
};
pub use interfaces::{Column, ColumnOptions, Entity, EntityInfo, FieldInfo, IntoColumn};
pub use mapper::{RowMapper, coerce};
pub use models::{ColumnDescriptor, DEFAULT_PRIMARY_KEY, IndexKind, TableDescriptor};
#[cfg(feature = "mysql")]
pub use mysql::MySqlExecutor;
pub use page::PageResult;
pub use query::{Condition, ConditionValue, Filter, Operator, OrderBy, PageRange, QueryWrapper};
pub use registry::MetadataRegistry;
pub use value::{FieldKind, Json, SqlField, TypeMismatch, Value};

pub use crate::errors::DbError;
pub use easydao_macros::Entity;
