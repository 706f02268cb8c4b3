use model::{core::value::Value, records::row::Row};

/// Provides database-specific CSV encoding for COPY style ingestion.
pub trait CopyValueEncoder {
    /// Encodes a concrete value into the backend's CSV representation.
    fn encode_value(&self, value: &Value) -> String;

    /// Encodes a SQL NULL into its CSV literal form (e.g. `\N`).
    fn encode_null(&self) -> String;

    /// Appends one CSV line for `row`, newline included.
    fn encode_row(&self, row: &Row, out: &mut String) {
        for (i, value) in row.values.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&self.encode_value(value));
        }
        out.push('\n');
    }
}
