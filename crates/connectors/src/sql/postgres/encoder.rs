use crate::sql::base::encoder::CopyValueEncoder;
use chrono::SecondsFormat;
use model::core::value::Value;
use std::fmt::Write;

/// Literal used for NULL in the COPY statement options.
pub const COPY_NULL: &str = r"\N";

/// Encodes values for `COPY ... FROM STDIN WITH (FORMAT csv, NULL '\N')`.
///
/// Text-like values are always quoted so that an empty string or a literal
/// `\N` can never be mistaken for NULL.
#[derive(Debug, Default)]
pub struct PgCopyValueEncoder;

impl PgCopyValueEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Wraps a field in double quotes, doubling embedded quotes.
    fn quote(value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('"');
        for ch in value.chars() {
            if ch == '"' {
                out.push('"');
            }
            out.push(ch);
        }
        out.push('"');
        out
    }

    fn bytea_hex(bytes: &[u8]) -> String {
        let mut out = String::with_capacity(2 + 2 * bytes.len());
        out.push_str("\\x");
        for b in bytes {
            let _ = write!(out, "{b:02x}");
        }
        out
    }
}

impl CopyValueEncoder for PgCopyValueEncoder {
    fn encode_value(&self, value: &Value) -> String {
        match value {
            Value::Null => self.encode_null(),
            Value::String(s) => Self::quote(s),
            Value::Json(v) => Self::quote(&v.to_string()),
            Value::Bytes(bytes) => Self::quote(&Self::bytea_hex(bytes)),
            Value::Numeric(v) => v.clone(),
            Value::Boolean(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => ryu::Buffer::new().format(*v).to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    fn encode_null(&self) -> String {
        COPY_NULL.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use model::records::row::Row;

    #[test]
    fn test_encode_row_as_csv_line() {
        let row = Row::new(vec![
            Value::Int(7),
            Value::String("say \"hola\", amigo".into()),
            Value::Null,
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()),
            Value::Boolean(true),
        ]);
        let mut line = String::new();
        PgCopyValueEncoder::new().encode_row(&row, &mut line);
        assert_eq!(
            line,
            "7,\"say \"\"hola\"\", amigo\",\\N,2024-01-31,true\n"
        );
    }

    #[test]
    fn test_empty_string_and_null_marker_are_quoted() {
        let encoder = PgCopyValueEncoder::new();
        assert_eq!(encoder.encode_value(&Value::String(String::new())), "\"\"");
        assert_eq!(encoder.encode_value(&Value::String(r"\N".into())), "\"\\N\"");
        assert_eq!(encoder.encode_value(&Value::Null), r"\N");
    }

    #[test]
    fn test_encode_binary_and_temporal_values() {
        let encoder = PgCopyValueEncoder::new();
        assert_eq!(
            encoder.encode_value(&Value::Bytes(vec![0xde, 0xad])),
            "\"\\xdead\""
        );
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(
            encoder.encode_value(&Value::Timestamp(ts)),
            "2024-05-01T12:30:00.000000Z"
        );
        assert_eq!(encoder.encode_value(&Value::Float(1.5)), "1.5");
        assert_eq!(encoder.encode_value(&Value::Numeric("12.3400".into())), "12.3400");
    }
}
