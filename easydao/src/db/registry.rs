use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::db::interfaces::{Entity, EntityInfo, FieldInfo};
use crate::db::models::{ColumnDescriptor, TableDescriptor, snake_case};
use crate::db::query::QueryWrapper;
use crate::errors::DbError;

/// Owned cache of resolved table descriptors, one per entity type.
///
/// Share it between engines with an `Arc`; every caller resolving the same
/// type observes the same descriptor instance.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    tables: RwLock<HashMap<TypeId, Arc<TableDescriptor>>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve<E: Entity>(&self) -> Result<Arc<TableDescriptor>, DbError> {
        let key = TypeId::of::<E>();
        if let Some(table) = self.tables.read().get(&key) {
            return Ok(table.clone());
        }

        // built outside the lock; a racing resolver may build a duplicate,
        // only the first insert is kept
        let built = Arc::new(build_descriptor(E::entity_info())?);
        let mut tables = self.tables.write();
        let winner = tables.entry(key).or_insert(built);
        Ok(winner.clone())
    }

    /// Fresh condition builder bound to `E`'s table.
    pub fn query<E: Entity>(&self) -> Result<QueryWrapper<E>, DbError> {
        Ok(QueryWrapper::new(self.resolve::<E>()?))
    }

    pub fn contains<E: Entity>(&self) -> bool {
        self.tables.read().contains_key(&TypeId::of::<E>())
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }

    /// Drops every cached descriptor. Engines keep the descriptors they
    /// already hold.
    pub fn clear(&self) {
        self.tables.write().clear();
    }
}

pub(crate) fn build_descriptor(info: EntityInfo) -> Result<TableDescriptor, DbError> {
    let entity = info.type_name;
    let fail = |reason: String| DbError::Metadata { entity, reason };

    let name = match info.table {
        Some("") => return Err(fail("table name override is empty".into())),
        Some(name) => name.to_string(),
        None => snake_case(entity),
    };

    let mut columns = Vec::new();
    let mut seen = HashSet::new();
    for field in info.fields.iter().filter(|f| f.is_mapped()) {
        let column = build_column(field).map_err(&fail)?;
        if !seen.insert(column.name.clone()) {
            return Err(fail(format!("column `{}` is declared twice", column.name)));
        }
        columns.push(column);
    }

    let keys: Vec<_> = columns.iter().filter(|c| c.primary_key).map(|c| c.field).collect();
    if keys.len() > 1 {
        return Err(fail(format!(
            "more than one primary key field: {}",
            keys.join(", ")
        )));
    }

    let comment = info.comment.filter(|c| !c.is_empty()).map(str::to_string);
    Ok(TableDescriptor::new(entity, name, comment, columns))
}

fn build_column(field: &FieldInfo) -> Result<ColumnDescriptor, String> {
    let opts = &field.options;
    let name = match opts.name {
        Some("") => return Err(format!("column name override on `{}` is empty", field.name)),
        Some(name) => name.to_string(),
        None => snake_case(field.name),
    };
    let sql_type = opts
        .sql_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| field.kind.default_sql_type())
        .to_string();

    // primary keys default to NOT NULL AUTO_INCREMENT
    let nullable = opts.nullable.unwrap_or(!field.primary_key);
    let auto_increment = opts.auto_increment.unwrap_or(field.primary_key);

    Ok(ColumnDescriptor {
        name,
        sql_type,
        nullable,
        default_value: opts.default_value.filter(|d| !d.is_empty()).map(str::to_string),
        auto_increment,
        primary_key: field.primary_key,
        unique: opts.unique.unwrap_or(false),
        index: opts.index,
        comment: opts.comment.filter(|c| !c.is_empty()).map(str::to_string),
        created_at: field.created_at,
        updated_at: field.updated_at,
        field: field.name,
        kind: field.kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::IndexKind;
    use crate::db::value::{FieldKind, Value};

    #[derive(Default)]
    struct UserProfile {
        id: Option<i64>,
        nick_name: Option<String>,
    }

    impl Entity for UserProfile {
        fn entity_info() -> EntityInfo {
            EntityInfo::new("UserProfile")
                .field(FieldInfo::new("id", FieldKind::BigInt).primary_key())
                .field(FieldInfo::new("nick_name", FieldKind::Text).column())
                .field(FieldInfo::new("scratch", FieldKind::Text))
                .field(
                    FieldInfo::new("login_count", FieldKind::Int)
                        .column()
                        .nullable(false)
                        .default_value("0")
                        .index(IndexKind::Index),
                )
                .field(FieldInfo::new("created_time", FieldKind::DateTime).created_at())
        }

        fn read_field(&self, field: &str) -> Option<Value> {
            match field {
                "id" => Some(self.id.into()),
                "nick_name" => Some(self.nick_name.clone().into()),
                _ => None,
            }
        }

        fn write_field(&mut self, _field: &str, _value: Value) -> Result<(), DbError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct TwoKeys;

    impl Entity for TwoKeys {
        fn entity_info() -> EntityInfo {
            EntityInfo::new("TwoKeys")
                .field(FieldInfo::new("a", FieldKind::Int).primary_key())
                .field(FieldInfo::new("b", FieldKind::Int).primary_key())
        }

        fn read_field(&self, _field: &str) -> Option<Value> {
            None
        }

        fn write_field(&mut self, _field: &str, _value: Value) -> Result<(), DbError> {
            Ok(())
        }
    }

    #[test]
    fn test_resolve_returns_same_instance() {
        let registry = MetadataRegistry::new();
        let first = registry.resolve::<UserProfile>().unwrap();
        let second = registry.resolve::<UserProfile>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_descriptor_defaults() {
        let table = MetadataRegistry::new().resolve::<UserProfile>().unwrap();
        assert_eq!(table.name, "user_profile");
        assert_eq!(table.primary_key, "id");
        let names: Vec<_> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "nick_name", "login_count", "created_time"]);

        let id = table.primary_column().unwrap();
        assert!(!id.nullable);
        assert!(id.auto_increment);
        assert_eq!(id.sql_type, "BIGINT");

        let login = table.column("login_count").unwrap();
        assert_eq!(login.sql_type, "INT(11)");
        assert_eq!(login.default_value.as_deref(), Some("0"));
        assert_eq!(login.index, Some(IndexKind::Index));

        let created = table.column("created_time").unwrap();
        assert!(created.created_at);
        assert_eq!(created.sql_type, "DATETIME");
    }

    #[test]
    fn test_unmarked_fields_are_invisible() {
        let table = MetadataRegistry::new().resolve::<UserProfile>().unwrap();
        assert!(table.column_for_field("scratch").is_none());
    }

    #[test]
    fn test_two_primary_keys_is_a_metadata_fault() {
        let registry = MetadataRegistry::new();
        let err = registry.resolve::<TwoKeys>().unwrap_err();
        assert_eq!(err.code(), "metadata_error");
        assert!(!registry.contains::<TwoKeys>());
    }

    #[test]
    fn test_explicit_overrides_win() {
        let info = EntityInfo::new("Account")
            .table("accounts")
            .comment("all accounts")
            .field(
                FieldInfo::new("email", FieldKind::Text)
                    .column()
                    .name("mail")
                    .sql_type("VARCHAR(100)")
                    .unique(true),
            );
        let table = build_descriptor(info).unwrap();
        assert_eq!(table.name, "accounts");
        assert_eq!(table.comment.as_deref(), Some("all accounts"));
        let mail = table.column("mail").unwrap();
        assert_eq!(mail.sql_type, "VARCHAR(100)");
        assert!(mail.unique);
        assert_eq!(table.column_name_for("email"), "mail");
    }

    #[test]
    fn test_duplicate_column_names_rejected() {
        let info = EntityInfo::new("Dup")
            .field(FieldInfo::new("a", FieldKind::Int).column().name("x"))
            .field(FieldInfo::new("b", FieldKind::Int).column().name("x"));
        assert!(build_descriptor(info).is_err());
    }

    #[test]
    fn test_concurrent_resolution_converges() {
        let registry = Arc::new(MetadataRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.resolve::<UserProfile>().unwrap())
            })
            .collect();
        let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winner = registry.resolve::<UserProfile>().unwrap();
        assert!(tables.iter().all(|t| Arc::ptr_eq(t, &winner)));
    }

    #[test]
    fn test_clear_forgets_descriptors() {
        let registry = MetadataRegistry::new();
        registry.resolve::<UserProfile>().unwrap();
        registry.clear();
        assert!(registry.is_empty());
    }
}
