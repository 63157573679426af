//! Row-to-JSON serialization for raw query results.

use serde_json::{Value, json};
use sqlx::{Column, Row, postgres::PgRow};

/// Convert a Postgres row to a JSON object, column by column.
///
/// Values are decoded by probing a small set of common types and
/// falling back to null for anything unrecognized.
pub fn row_to_json(row: &PgRow) -> Value {
    let mut obj = serde_json::Map::new();

    for col in row.columns() {
        let name = col.name();

        let value: Value = if let Ok(v) = row.try_get::<i64, _>(name) {
            json!(v)
        } else if let Ok(v) = row.try_get::<i32, _>(name) {
            json!(v)
        } else if let Ok(v) = row.try_get::<f64, _>(name) {
            json!(v)
        } else if let Ok(v) = row.try_get::<bool, _>(name) {
            json!(v)
        } else if let Ok(v) = row.try_get::<String, _>(name) {
            json!(v)
        } else if let Ok(v) = row.try_get::<uuid::Uuid, _>(name) {
            json!(v.to_string())
        } else if let Ok(v) = row.try_get::<Value, _>(name) {
            v
        } else if let Ok(v) = row.try_get::<Option<String>, _>(name) {
            match v {
                Some(s) => json!(s),
                None => Value::Null,
            }
        } else {
            Value::Null
        };

        obj.insert(name.to_string(), value);
    }

    Value::Object(obj)
}

/// Convert a result set to a JSON array of objects.
pub fn rows_to_json(rows: &[PgRow]) -> Value {
    Value::Array(rows.iter().map(row_to_json).collect())
}
