//! Conversion of BigQuery JSON cells into [`Value`]s, driven by the result
//! schema.

use crate::{
    error::SourceError,
    sql::bigquery::types::{TableFieldSchema, TableRow},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use model::{core::value::Value, records::row::Row};
use serde_json::Value as Json;

pub fn decode_row(fields: &[TableFieldSchema], row: TableRow) -> Result<Row, SourceError> {
    if row.f.len() != fields.len() {
        return Err(SourceError::InvalidResponse(format!(
            "row has {} cells but the schema has {} fields",
            row.f.len(),
            fields.len()
        )));
    }

    let values = fields
        .iter()
        .zip(row.f)
        .map(|(field, cell)| decode_cell(field, cell.v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Row::new(values))
}

pub fn decode_cell(field: &TableFieldSchema, raw: Json) -> Result<Value, SourceError> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    if field.is_repeated() || is_record(field) {
        return Ok(Value::Json(nested_json(field, raw)));
    }

    let text = match raw {
        Json::String(s) => s,
        other => {
            return Err(invalid(field, format!("expected a string cell, got {other}")));
        }
    };

    let value = match field.field_type.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT64" => text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| invalid(field, e.to_string()))?,
        "FLOAT" | "FLOAT64" => text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| invalid(field, e.to_string()))?,
        "BOOLEAN" | "BOOL" => match text.to_ascii_lowercase().as_str() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            other => return Err(invalid(field, format!("not a boolean: {other}"))),
        },
        "NUMERIC" | "BIGNUMERIC" | "DECIMAL" | "BIGDECIMAL" => Value::Numeric(text),
        "DATE" => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| invalid(field, e.to_string()))?,
        "DATETIME" => parse_datetime(&text)
            .map(Value::DateTime)
            .map_err(|e| invalid(field, e))?,
        "TIME" => NaiveTime::parse_from_str(&text, "%H:%M:%S%.f")
            .map(Value::Time)
            .map_err(|e| invalid(field, e.to_string()))?,
        "TIMESTAMP" => parse_timestamp(&text)
            .map(Value::Timestamp)
            .map_err(|e| invalid(field, e))?,
        "BYTES" => STANDARD
            .decode(text.as_bytes())
            .map(Value::Bytes)
            .map_err(|e| invalid(field, e.to_string()))?,
        "JSON" => serde_json::from_str(&text)
            .map(Value::Json)
            .unwrap_or(Value::String(text)),
        // STRING, GEOGRAPHY, INTERVAL and anything newer travel as text.
        _ => Value::String(text),
    };
    Ok(value)
}

fn is_record(field: &TableFieldSchema) -> bool {
    matches!(
        field.field_type.to_ascii_uppercase().as_str(),
        "RECORD" | "STRUCT"
    )
}

/// Flattens the `{"f": [{"v": ..}]}` / `[{"v": ..}]` envelopes of nested
/// cells into plain JSON objects and arrays.
fn nested_json(field: &TableFieldSchema, raw: Json) -> Json {
    if field.is_repeated() {
        let items = match raw {
            Json::Array(items) => items,
            other => return other,
        };
        return Json::Array(
            items
                .into_iter()
                .map(|item| {
                    let inner = unwrap_v(item);
                    if is_record(field) {
                        record_json(field, inner)
                    } else {
                        inner
                    }
                })
                .collect(),
        );
    }
    record_json(field, raw)
}

fn record_json(field: &TableFieldSchema, raw: Json) -> Json {
    let cells = match raw {
        Json::Object(mut obj) => match obj.remove("f") {
            Some(Json::Array(cells)) => cells,
            _ => return Json::Object(obj),
        },
        other => return other,
    };

    let mut out = serde_json::Map::with_capacity(field.fields.len());
    for (sub, cell) in field.fields.iter().zip(cells) {
        let inner = unwrap_v(cell);
        let value = if inner.is_null() {
            Json::Null
        } else if sub.is_repeated() || is_record(sub) {
            nested_json(sub, inner)
        } else {
            inner
        };
        out.insert(sub.name.clone(), value);
    }
    Json::Object(out)
}

fn unwrap_v(cell: Json) -> Json {
    match cell {
        Json::Object(mut obj) if obj.contains_key("v") => obj.remove("v").unwrap_or(Json::Null),
        other => other,
    }
}

fn parse_datetime(text: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| e.to_string())
}

/// Timestamps arrive as epoch microseconds when `useInt64Timestamp` is set,
/// and as (possibly exponential) epoch seconds otherwise.
fn parse_timestamp(text: &str) -> Result<DateTime<chrono::Utc>, String> {
    if let Ok(micros) = text.parse::<i64>() {
        return DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| format!("timestamp out of range: {text}"));
    }
    let seconds = text.parse::<f64>().map_err(|e| e.to_string())?;
    let micros = (seconds * 1_000_000.0).round() as i64;
    DateTime::from_timestamp_micros(micros).ok_or_else(|| format!("timestamp out of range: {text}"))
}

fn invalid(field: &TableFieldSchema, message: String) -> SourceError {
    SourceError::Value {
        column: field.name.clone(),
        field_type: field.field_type.clone(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn field(name: &str, ty: &str) -> TableFieldSchema {
        TableFieldSchema {
            name: name.into(),
            field_type: ty.into(),
            mode: Some("NULLABLE".into()),
            fields: vec![],
        }
    }

    #[test]
    fn test_decode_scalar_row() {
        let fields = vec![
            field("id", "INTEGER"),
            field("monto", "NUMERIC"),
            field("fecha", "DATE"),
            field("activo", "BOOLEAN"),
            field("nota", "STRING"),
        ];
        let row: TableRow = serde_json::from_value(json!({
            "f": [{"v": "42"}, {"v": "10.50"}, {"v": "2024-06-01"}, {"v": "true"}, {"v": null}]
        }))
        .unwrap();

        let decoded = decode_row(&fields, row).unwrap();
        assert_eq!(
            decoded.values,
            vec![
                Value::Int(42),
                Value::Numeric("10.50".into()),
                Value::Date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
                Value::Boolean(true),
                Value::Null,
            ]
        );
    }

    #[test]
    fn test_decode_timestamp_forms() {
        let ts = field("ts", "TIMESTAMP");
        let expected = Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(decode_cell(&ts, json!("1704067200000000")).unwrap(), expected);
        assert_eq!(decode_cell(&ts, json!("1.7040672E9")).unwrap(), expected);
    }

    #[test]
    fn test_decode_bytes_and_datetime() {
        assert_eq!(
            decode_cell(&field("b", "BYTES"), json!("3q0=")).unwrap(),
            Value::Bytes(vec![0xde, 0xad])
        );
        let dt = decode_cell(&field("d", "DATETIME"), json!("2024-01-02T03:04:05.5")).unwrap();
        assert!(matches!(dt, Value::DateTime(_)));
    }

    #[test]
    fn test_decode_repeated_record_as_json() {
        let mut items = field("items", "RECORD");
        items.mode = Some("REPEATED".into());
        items.fields = vec![field("sku", "STRING"), field("qty", "INTEGER")];

        let raw = json!([
            {"v": {"f": [{"v": "A1"}, {"v": "2"}]}},
            {"v": {"f": [{"v": "B7"}, {"v": null}]}}
        ]);
        let decoded = decode_cell(&items, raw).unwrap();
        assert_eq!(
            decoded,
            Value::Json(json!([
                {"sku": "A1", "qty": "2"},
                {"sku": "B7", "qty": null}
            ]))
        );
    }

    #[test]
    fn test_invalid_integer_reports_column() {
        let err = decode_cell(&field("id", "INT64"), json!("abc")).unwrap_err();
        assert!(matches!(err, SourceError::Value { ref column, .. } if column == "id"));
    }

    #[test]
    fn test_cell_count_mismatch_is_rejected() {
        let row: TableRow = serde_json::from_value(json!({"f": [{"v": "1"}]})).unwrap();
        let fields = vec![field("a", "INTEGER"), field("b", "INTEGER")];
        assert!(decode_row(&fields, row).is_err());
    }
}
