//! Conversions between the query crate's values and SQLite rows.

use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use tenant_query::{FieldType, ResourceSchema, SqlValue};

pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Binds parameters in placeholder order; `params[0]` becomes `$1`.
pub fn bind_params<'q>(mut query: SqliteQuery<'q>, params: &[SqlValue]) -> SqliteQuery<'q> {
    for param in params {
        query = match param {
            SqlValue::String(s) => query.bind(s.clone()),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(*b),
        };
    }
    query
}

/// Converts a row using the storage class of each value, so it works for
/// arbitrary raw statements as well as registry listings. BLOBs are hex.
pub fn row_to_json(row: &SqliteRow) -> Result<Map<String, Value>, sqlx::Error> {
    let mut object = Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let (is_null, storage) = {
            let raw = row.try_get_raw(index)?;
            (raw.is_null(), raw.type_info().name().to_string())
        };

        let value = if is_null {
            Value::Null
        } else {
            match storage.as_str() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(index)?),
                "REAL" => Value::from(row.try_get::<f64, _>(index)?),
                "BLOB" => Value::String(hex::encode(row.try_get::<Vec<u8>, _>(index)?)),
                _ => Value::String(row.try_get::<String, _>(index)?),
            }
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(object)
}

/// Like [`row_to_json`], with boolean registry fields restored from 0/1.
/// Any other stored value is left as is and matches no flag test.
pub fn row_to_record(row: &SqliteRow, schema: &ResourceSchema) -> Result<Value, sqlx::Error> {
    let mut object = row_to_json(row)?;
    for field in schema.fields {
        if field.field_type != FieldType::Boolean {
            continue;
        }
        if let Some(value) = object.get_mut(field.key) {
            match value.as_i64() {
                Some(0) => *value = Value::Bool(false),
                Some(1) => *value = Value::Bool(true),
                _ => {}
            }
        }
    }
    Ok(Value::Object(object))
}
