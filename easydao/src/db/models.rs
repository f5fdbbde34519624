use std::collections::HashMap;

use heck::ToSnakeCase;

use crate::db::value::FieldKind;

/// Column name used when an entity declares no primary-key field.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Index,
    Unique,
}

impl IndexKind {
    /// Parses the textual index kinds accepted in column declarations.
    /// Unknown kinds fall back to a plain index.
    pub fn parse(kind: &str) -> Self {
        match kind.trim().to_ascii_uppercase().as_str() {
            "UNIQUE" | "UNIQUE_KEY" => IndexKind::Unique,
            _ => IndexKind::Index,
        }
    }

    pub const fn keyword(self) -> &'static str {
        match self {
            IndexKind::Index => "INDEX",
            IndexKind::Unique => "UNIQUE KEY",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub auto_increment: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub index: Option<IndexKind>,
    pub comment: Option<String>,
    pub created_at: bool,
    pub updated_at: bool,
    /// Entity field this column reads from and writes to.
    pub field: &'static str,
    pub kind: FieldKind,
}

impl ColumnDescriptor {
    /// DDL fragment following the column name in `CREATE TABLE`.
    pub fn definition(&self) -> String {
        let mut def = self.sql_type.clone();
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if self.auto_increment {
            def.push_str(" AUTO_INCREMENT");
        }
        // an autoincrement column never takes a default
        if let Some(default) = self.default_value.as_deref().filter(|_| !self.auto_increment) {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        if self.primary_key {
            def.push_str(" PRIMARY KEY");
        }
        if self.unique {
            def.push_str(" UNIQUE KEY");
        }
        if let Some(comment) = self.comment.as_deref().filter(|c| !c.is_empty()) {
            def.push_str(" COMMENT ");
            def.push_str(&quote_literal(comment));
        }
        def
    }
}

/// Resolved mapping of an entity type to its table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub entity: &'static str,
    pub name: String,
    pub comment: Option<String>,
    pub primary_key: String,
    pub columns: Vec<ColumnDescriptor>,
    field_columns: HashMap<&'static str, usize>,
}

impl TableDescriptor {
    pub(crate) fn new(
        entity: &'static str,
        name: String,
        comment: Option<String>,
        columns: Vec<ColumnDescriptor>,
    ) -> Self {
        let primary_key = columns
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| DEFAULT_PRIMARY_KEY.to_string());
        let field_columns = columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.field, idx))
            .collect();
        Self {
            entity,
            name,
            comment,
            primary_key,
            columns,
            field_columns,
        }
    }

    pub fn primary_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.primary_key)
    }

    pub fn column_for_field(&self, field: &str) -> Option<&ColumnDescriptor> {
        self.field_columns.get(field).map(|idx| &self.columns[*idx])
    }

    /// Column name for an entity field; unmapped fields fall back to the
    /// snake_case of the field name.
    pub fn column_name_for(&self, field: &str) -> String {
        match self.column_for_field(field) {
            Some(column) => column.name.clone(),
            None => field.to_snake_case(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

pub fn snake_case(name: &str) -> String {
    name.to_snake_case()
}

/// Single-quoted SQL string literal.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
