use crate::{error::ConfigError, retry::RetryPolicy};
use connectors::{
    dialect::{BigQuery, Dialect, Postgres},
    sql::base::{
        destination::TableName,
        source::{DATE_PARAM_NAME, SourceQuery, SourceTable},
    },
};
use model::core::date::PartitionDate;
use std::path::Path;

/// Placeholder that marks the date slot in a query template.
pub const DATE_TOKEN: &str = "$fecha";

pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// How the destination partition is cleared before reloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplaceMode {
    /// Remove only the rows of the target date.
    #[default]
    DeleteByDate,
    /// Remove every row of the table. Only for tables that hold a single
    /// partition at a time.
    Truncate,
}

/// Extract statement with a date slot.
///
/// The date never gets spliced into the SQL text: every `$fecha` becomes the
/// named parameter `@fecha` and the date is bound separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    sql: String,
}

impl QueryTemplate {
    pub fn new(raw: impl Into<String>) -> Result<Self, ConfigError> {
        let raw = raw.into();
        let sql = parameterize(&raw)?;
        if sql == raw {
            return Err(ConfigError::MissingDateToken(DATE_TOKEN));
        }
        Ok(QueryTemplate { sql })
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::TemplateRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(raw)
    }

    /// The template with every date slot turned into `@fecha`.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn render(&self, date: PartitionDate) -> SourceQuery {
        SourceQuery {
            sql: self.sql.clone(),
            date,
        }
    }
}

/// Literal prefixes that turn `'$fecha'` into a typed value.
const TYPED_LITERALS: [&str; 3] = ["DATETIME", "TIMESTAMP", "DATE"];

/// Rewrites every date slot of a template into the `@fecha` parameter.
///
/// - bare `$fecha` and a literal holding only the token (`'$fecha'`,
///   `"$fecha"`) become `@fecha`
/// - typed literals (`DATE '$fecha'`) become `CAST(@fecha AS DATE)`
/// - a token inside a longer literal (`'$fecha 00:00:00'`) is rejected
///
/// Comments and backquoted identifiers are copied as they are.
fn parameterize(raw: &str) -> Result<String, ConfigError> {
    let param = format!("@{DATE_PARAM_NAME}");
    let mut out = String::with_capacity(raw.len());
    let mut pos = 0;

    while let Some(rest) = raw.get(pos..).filter(|rest| !rest.is_empty()) {
        if starts_with_token(rest) {
            out.push_str(&param);
            pos += DATE_TOKEN.len();
            continue;
        }

        let end = if rest.starts_with('\'') || rest.starts_with('"') {
            let (body, close) = match literal_close(rest) {
                Some(close) => (&rest[1..close - 1], close),
                None => (&rest[1..], rest.len()),
            };
            if body == DATE_TOKEN && close > body.len() + 1 {
                match typed_literal_start(&out) {
                    Some((start, ty)) => {
                        out.truncate(start);
                        out.push_str(&format!("CAST({param} AS {ty})"));
                    }
                    None => out.push_str(&param),
                }
                pos += close;
                continue;
            }
            if contains_token(body) {
                return Err(ConfigError::EmbeddedDateToken(rest[..close].to_string()));
            }
            close
        } else if rest.starts_with('`') {
            rest[1..].find('`').map_or(rest.len(), |i| i + 2)
        } else if rest.starts_with("--") || rest.starts_with('#') {
            rest.find('\n').map_or(rest.len(), |i| i + 1)
        } else if rest.starts_with("/*") {
            rest[2..].find("*/").map_or(rest.len(), |i| i + 4)
        } else {
            rest.chars().next().map_or(rest.len(), char::len_utf8)
        };

        out.push_str(&rest[..end]);
        pos += end;
    }
    Ok(out)
}

/// `$fecha` not followed by more identifier characters (`$fechas` and
/// `$fecha_fin` are other tokens).
fn starts_with_token(s: &str) -> bool {
    s.strip_prefix(DATE_TOKEN).is_some_and(|after| {
        !after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

fn contains_token(s: &str) -> bool {
    s.match_indices(DATE_TOKEN)
        .any(|(i, _)| starts_with_token(&s[i..]))
}

/// Byte length of the quoted literal at the start of `s`, both quotes
/// included, or `None` when it is never closed. Backslash escapes are skipped.
fn literal_close(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let quote = *bytes.first()?;
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Finds a `DATE`/`DATETIME`/`TIMESTAMP` keyword right before the literal
/// about to be written, returning where it starts and its canonical name.
fn typed_literal_start(out: &str) -> Option<(usize, &'static str)> {
    let trimmed = out.trim_end();
    TYPED_LITERALS.into_iter().find_map(|ty| {
        let start = trimmed.len().checked_sub(ty.len())?;
        let word = trimmed.get(start..)?;
        let standalone = !trimmed[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        (word.eq_ignore_ascii_case(ty) && standalone).then_some((start, ty))
    })
}

/// Immutable settings for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub date: PartitionDate,
    pub source_table: SourceTable,
    pub source_date_column: String,
    pub destination_table: TableName,
    pub destination_date_column: String,
    pub replace_mode: ReplaceMode,
    pub query: QueryTemplate,
    /// Maximum rows per load transaction.
    pub chunk_size: usize,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    /// Checks everything that can be checked without touching either store.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidRetryBound);
        }
        BigQuery.quote_path(&self.source_table.parts())?;
        BigQuery.quote_identifier(&self.source_date_column)?;
        self.destination_table.quoted()?;
        Postgres.quote_identifier(&self.destination_date_column)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Write, time::Duration};

    fn config() -> PipelineConfig {
        PipelineConfig {
            date: "2024-06-01".parse().unwrap(),
            source_table: SourceTable::new("data-project", "ventas", "diarias"),
            source_date_column: "fecha".into(),
            destination_table: "public.ventas".parse().unwrap(),
            destination_date_column: "fecha".into(),
            replace_mode: ReplaceMode::DeleteByDate,
            query: QueryTemplate::new("SELECT * FROM t WHERE fecha = $fecha").unwrap(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::new(5, Duration::from_secs(5)),
        }
    }

    #[test]
    fn test_template_binds_instead_of_substituting() {
        let template = QueryTemplate::new("SELECT * FROM t WHERE fecha = $fecha").unwrap();
        let query = template.render("2024-06-01".parse().unwrap());
        assert_eq!(query.sql, "SELECT * FROM t WHERE fecha = @fecha");
        assert!(!query.sql.contains("2024-06-01"));
        assert_eq!(query.date.to_string(), "2024-06-01");
    }

    #[test]
    fn test_template_drops_legacy_quotes() {
        let template =
            QueryTemplate::new("SELECT * FROM t WHERE a = '$fecha' AND b = \"$fecha\"").unwrap();
        assert_eq!(template.sql(), "SELECT * FROM t WHERE a = @fecha AND b = @fecha");
    }

    #[test]
    fn test_template_ignores_longer_tokens() {
        let template = QueryTemplate::new("SELECT '$fechas', $fecha_fin, $fecha").unwrap();
        assert_eq!(template.sql(), "SELECT '$fechas', $fecha_fin, @fecha");
    }

    #[test]
    fn test_template_casts_typed_literals() {
        let template = QueryTemplate::new(
            "SELECT * FROM t WHERE d = DATE '$fecha' AND ts >= timestamp '$fecha' \
             AND dt < DATETIME_ADD(DATETIME \"$fecha\", INTERVAL 1 DAY)",
        )
        .unwrap();
        assert_eq!(
            template.sql(),
            "SELECT * FROM t WHERE d = CAST(@fecha AS DATE) \
             AND ts >= CAST(@fecha AS TIMESTAMP) \
             AND dt < DATETIME_ADD(CAST(@fecha AS DATETIME), INTERVAL 1 DAY)"
        );
    }

    #[test]
    fn test_template_keeps_columns_named_like_types() {
        let template = QueryTemplate::new("SELECT * FROM t WHERE t.date = '$fecha'").unwrap();
        assert_eq!(template.sql(), "SELECT * FROM t WHERE t.date = @fecha");
    }

    #[test]
    fn test_template_rejects_token_inside_longer_literal() {
        let err = QueryTemplate::new("SELECT * FROM t WHERE ts >= '$fecha 00:00:00'").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EmbeddedDateToken(ref literal) if literal == "'$fecha 00:00:00'"
        ));

        let err = QueryTemplate::new("SELECT * FROM t WHERE p = \"ventas_$fecha\"").unwrap_err();
        assert!(matches!(err, ConfigError::EmbeddedDateToken(_)));
    }

    #[test]
    fn test_template_skips_comments_and_quoted_names() {
        let template = QueryTemplate::new(
            "-- don't touch $fecha here\nSELECT `$fecha` FROM t /* it's $fecha */ WHERE d = $fecha",
        )
        .unwrap();
        assert_eq!(
            template.sql(),
            "-- don't touch $fecha here\nSELECT `$fecha` FROM t /* it's $fecha */ WHERE d = @fecha"
        );
    }

    #[test]
    fn test_template_without_token_is_rejected() {
        let err = QueryTemplate::new("SELECT * FROM t").unwrap_err();
        assert!(matches!(err, ConfigError::MissingDateToken("$fecha")));
    }

    #[tokio::test]
    async fn test_template_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SELECT id FROM `p.d.t`\nWHERE fecha = '$fecha'").unwrap();

        let template = QueryTemplate::from_file(file.path()).await.unwrap();
        assert!(template.sql().contains("WHERE fecha = @fecha"));
    }

    #[tokio::test]
    async fn test_missing_template_file() {
        let err = QueryTemplate::from_file("/nonexistent/query.sql")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::TemplateRead { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut cfg = config();
        assert!(cfg.validate().is_ok());
        cfg.chunk_size = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidChunkSize)));
    }

    #[test]
    fn test_validate_rejects_bad_source_identifier() {
        let mut cfg = config();
        cfg.source_date_column = "fe`cha".into();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidIdentifier(_))
        ));
    }
}
