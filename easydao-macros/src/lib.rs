mod entity;

use proc_macro::TokenStream;
extern crate proc_macro;

/// Derives `easydao::db::Entity` for a struct with named fields.
///
/// Only fields carrying one of the marker attributes are persisted; every
/// other field is ignored. Each mapped field also gets a typed column
/// token, e.g. `User::NICK_NAME: Column<User>`.
///
/// # Attributes
///
/// ## `#[table(...)]` - Type-level attributes
/// - `name = "users"` - Table name (defaults to the snake_case type name)
/// - `comment = "..."` - Table comment
/// - `crate = "path::to::db"` - Where the runtime types live (defaults to `::easydao::db`)
///
/// ## Field markers
/// - `#[id]` - Primary key; not nullable and auto-increment unless overridden
/// - `#[column]` - Plain column
/// - `#[created_at]` - Stamped with the current time on insert
/// - `#[updated_at]` - Stamped with the current time on insert and update
///
/// Every marker accepts the same overrides, e.g.
/// `#[column(name = "mail", sql_type = "VARCHAR(100)", nullable = false,
/// default = "''", unique, index = "UNIQUE", comment = "login email")]`.
/// `auto_increment` is also accepted.
#[proc_macro_derive(Entity, attributes(table, id, column, created_at, updated_at))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive_entity(input)
}
