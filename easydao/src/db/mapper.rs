use chrono::{TimeZone, Utc};

use crate::db::executor::{Row, RowCursor};
use crate::db::interfaces::Entity;
use crate::db::models::TableDescriptor;
use crate::db::value::{FieldKind, Value};
use crate::errors::DbError;

/// Materializes result rows into entities.
pub struct RowMapper;

impl RowMapper {
    /// Maps every remaining row of `cursor`.
    pub fn map_all<E: Entity>(
        table: &TableDescriptor,
        cursor: &mut RowCursor,
    ) -> Result<Vec<E>, DbError> {
        let mut entities = Vec::with_capacity(cursor.remaining());
        for row in cursor.by_ref() {
            entities.push(Self::map_row(table, row)?);
        }
        Ok(entities)
    }

    /// Columns missing from the row and null cells leave the field at its
    /// default.
    pub fn map_row<E: Entity>(table: &TableDescriptor, mut row: Row) -> Result<E, DbError> {
        let mut entity = E::default();
        for column in &table.columns {
            let Some(value) = row.take(&column.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            entity.write_field(column.field, coerce(value, column.kind))?;
        }
        Ok(entity)
    }
}

/// Converts between timestamp-like and date-like values and between the
/// two float precisions. Every other pairing passes through unchanged.
pub fn coerce(value: Value, target: FieldKind) -> Value {
    match (value, target) {
        (Value::Timestamp(ts), FieldKind::DateTime) => Value::DateTime(Utc.from_utc_datetime(&ts)),
        (Value::DateTime(dt), FieldKind::Timestamp) => Value::Timestamp(dt.naive_utc()),
        (Value::Double(v), FieldKind::Float) => Value::Float(v as f32),
        (Value::Float(v), FieldKind::Double) => Value::Double(f64::from(v)),
        (value, _) => value,
    }
}
