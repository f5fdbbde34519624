pub mod conf;
pub mod db;
pub mod errors;
pub mod testing;

pub use conf::DaoConf;
pub use db::{
    Column, CrudEngine, Entity, MetadataRegistry, PageResult, QueryWrapper, SqlExecutor, Value,
};
pub use errors::{DbError, DbResult, Fault};
