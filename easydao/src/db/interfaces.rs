use std::fmt;
use std::marker::PhantomData;

use crate::db::models::{IndexKind, TableDescriptor};
use crate::db::value::{FieldKind, Value};
use crate::errors::DbError;

/// Column-level overrides declared on a field. Unset entries fall back to
/// the defaults of the field's marker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnOptions {
    pub name: Option<&'static str>,
    pub sql_type: Option<&'static str>,
    pub nullable: Option<bool>,
    pub default_value: Option<&'static str>,
    pub auto_increment: Option<bool>,
    pub unique: Option<bool>,
    pub index: Option<IndexKind>,
    pub comment: Option<&'static str>,
}

/// Registration-time description of one entity field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub kind: FieldKind,
    pub primary_key: bool,
    pub column: bool,
    pub created_at: bool,
    pub updated_at: bool,
    pub options: ColumnOptions,
}

impl FieldInfo {
    /// An unmarked field. It stays invisible to persistence until one of
    /// the marker methods is applied.
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            primary_key: false,
            column: false,
            created_at: false,
            updated_at: false,
            options: ColumnOptions {
                name: None,
                sql_type: None,
                nullable: None,
                default_value: None,
                auto_increment: None,
                unique: None,
                index: None,
                comment: None,
            },
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.primary_key || self.column || self.created_at || self.updated_at
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn column(mut self) -> Self {
        self.column = true;
        self
    }

    pub fn created_at(mut self) -> Self {
        self.created_at = true;
        self
    }

    pub fn updated_at(mut self) -> Self {
        self.updated_at = true;
        self
    }

    pub fn name(mut self, name: &'static str) -> Self {
        self.options.name = Some(name);
        self
    }

    pub fn sql_type(mut self, sql_type: &'static str) -> Self {
        self.options.sql_type = Some(sql_type);
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.options.nullable = Some(nullable);
        self
    }

    pub fn default_value(mut self, default_value: &'static str) -> Self {
        self.options.default_value = Some(default_value);
        self
    }

    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.options.auto_increment = Some(auto_increment);
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.options.unique = Some(unique);
        self
    }

    pub fn index(mut self, index: IndexKind) -> Self {
        self.options.index = Some(index);
        self
    }

    pub fn comment(mut self, comment: &'static str) -> Self {
        self.options.comment = Some(comment);
        self
    }
}

/// Registration-time description of an entity type.
///
/// Built by `#[derive(Entity)]` or by hand in [`Entity::entity_info`].
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub type_name: &'static str,
    pub table: Option<&'static str>,
    pub comment: Option<&'static str>,
    pub fields: Vec<FieldInfo>,
}

impl EntityInfo {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            table: None,
            comment: None,
            fields: Vec::new(),
        }
    }

    pub fn table(mut self, table: &'static str) -> Self {
        self.table = Some(table);
        self
    }

    pub fn comment(mut self, comment: &'static str) -> Self {
        self.comment = Some(comment);
        self
    }

    pub fn field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }
}

/// A record type persisted through a [`CrudEngine`](crate::db::CrudEngine).
///
/// `Default` stands in for the zero-argument constructor: the row mapper
/// starts from it and leaves fields that have no matching column untouched.
pub trait Entity: Default + 'static {
    fn entity_info() -> EntityInfo;

    /// Current value of a mapped field, `None` if the entity has no such field.
    fn read_field(&self, field: &str) -> Option<Value>;

    fn write_field(&mut self, field: &str, value: Value) -> Result<(), DbError>;
}

/// Typed token naming one field of `E`.
///
/// Resolves to the same column name the registry assigns to that field, so
/// it can be used anywhere a string column name is accepted.
pub struct Column<E> {
    field: &'static str,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Column<E> {
    pub const fn new(field: &'static str) -> Self {
        Self {
            field,
            _entity: PhantomData,
        }
    }

    pub const fn field(&self) -> &'static str {
        self.field
    }
}

impl<E> Clone for Column<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Column<E> {}

impl<E> fmt::Debug for Column<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Column").field(&self.field).finish()
    }
}

impl<E> PartialEq for Column<E> {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
    }
}

impl<E> Eq for Column<E> {}

/// Anything that names a column of `E`'s table.
pub trait IntoColumn<E> {
    fn into_column(self, table: &TableDescriptor) -> String;
}

impl<E> IntoColumn<E> for &str {
    fn into_column(self, _table: &TableDescriptor) -> String {
        self.to_owned()
    }
}

impl<E> IntoColumn<E> for String {
    fn into_column(self, _table: &TableDescriptor) -> String {
        self
    }
}

impl<E> IntoColumn<E> for Column<E> {
    fn into_column(self, table: &TableDescriptor) -> String {
        table.column_name_for(self.field)
    }
}
