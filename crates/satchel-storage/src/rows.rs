// SPDX-FileCopyrightText: 2026 Satchel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridging between JSON values and SQLite values.
//!
//! Positional parameters arrive as `serde_json::Value`s and result rows are
//! materialized into keyed records, matching what the consumer-facing query
//! API exposes.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::types::{Value as SqlValue, ValueRef};
use satchel_core::{Row, SatchelError};
use serde_json::Value;

/// Convert positional JSON parameters into SQLite values.
///
/// Arrays and objects have no SQLite representation and are rejected.
pub(crate) fn bind_values(params: &[Value]) -> Result<Vec<SqlValue>, SatchelError> {
    params
        .iter()
        .map(|value| match value {
            Value::Null => Ok(SqlValue::Null),
            Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlValue::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(SqlValue::Real(f))
                } else {
                    Err(SatchelError::Query {
                        source: format!("unbindable numeric parameter: {n}").into(),
                    })
                }
            }
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(SatchelError::Query {
                source: format!("unsupported parameter type: {value}").into(),
            }),
        })
        .collect()
}

/// Materialize one result row into a keyed record.
pub(crate) fn materialize(
    columns: &[String],
    row: &rusqlite::Row<'_>,
) -> Result<Row, rusqlite::Error> {
    let mut record = Row::new();
    for (i, name) in columns.iter().enumerate() {
        record.insert(name.clone(), column_value(row.get_ref(i)?));
    }
    Ok(record)
}

fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(BASE64.encode(b)),
    }
}
