//! Identifier quoting for the two SQL dialects the loader talks to.

use crate::error::IdentifierError;

pub trait Dialect: Send + Sync {
    /// Wraps a single identifier in the dialect's quotation marks.
    ///
    /// - PostgreSQL uses double quotes: `"my_column"`
    /// - BigQuery uses backticks: `` `my_column` ``
    fn quote_identifier(&self, ident: &str) -> Result<String, IdentifierError>;

    fn name(&self) -> &'static str;

    /// Quotes a dotted path such as `schema.table` part by part.
    fn quote_path(&self, parts: &[&str]) -> Result<String, IdentifierError> {
        let quoted = parts
            .iter()
            .map(|part| self.quote_identifier(part))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(quoted.join("."))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn quote_identifier(&self, ident: &str) -> Result<String, IdentifierError> {
        if ident.is_empty() {
            return Err(invalid(self, ident, "empty identifier"));
        }
        if ident.contains('\0') {
            return Err(invalid(self, ident, "contains a NUL character"));
        }
        Ok(format!(r#""{}""#, ident.replace('"', r#""""#)))
    }

    fn name(&self) -> &'static str {
        "PostgreSQL"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BigQuery;

impl Dialect for BigQuery {
    fn quote_identifier(&self, ident: &str) -> Result<String, IdentifierError> {
        if ident.is_empty() {
            return Err(invalid(self, ident, "empty identifier"));
        }
        if ident.contains('`') || ident.contains('\\') {
            return Err(invalid(self, ident, "contains a backtick or backslash"));
        }
        Ok(format!("`{ident}`"))
    }

    fn name(&self) -> &'static str {
        "BigQuery"
    }
}

fn invalid(dialect: &impl Dialect, ident: &str, reason: &'static str) -> IdentifierError {
    IdentifierError {
        dialect: dialect.name(),
        ident: ident.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_quotes_each_path_part() {
        let quoted = Postgres.quote_path(&["public", "ventas"]).unwrap();
        assert_eq!(quoted, r#""public"."ventas""#);
    }

    #[test]
    fn test_postgres_doubles_embedded_quotes() {
        let quoted = Postgres.quote_identifier(r#"we"ird"#).unwrap();
        assert_eq!(quoted, r#""we""ird""#);
    }

    #[test]
    fn test_bigquery_rejects_backticks() {
        assert!(BigQuery.quote_identifier("bad`name").is_err());
        assert_eq!(BigQuery.quote_identifier("fecha").unwrap(), "`fecha`");
    }

    #[test]
    fn test_empty_identifier_is_rejected() {
        let err = Postgres.quote_path(&["public", ""]).unwrap_err();
        assert_eq!(err.reason, "empty identifier");
    }
}
