//! SQL parser wrapper

use crate::dialect::{BigQueryDialect, DuckDbDialect, SqlDialect};
use crate::error::{SqlError, SqlResult};
use sqlparser::ast::Statement;

/// SQL parser that wraps sqlparser-rs with dialect support
pub struct SqlParser {
    dialect: Box<dyn SqlDialect>,
}

impl SqlParser {
    /// Create a new parser with DuckDB dialect
    pub fn duckdb() -> Self {
        Self {
            dialect: Box::new(DuckDbDialect::new()),
        }
    }

    /// Create a new parser with BigQuery dialect
    pub fn bigquery() -> Self {
        Self {
            dialect: Box::new(BigQueryDialect::new()),
        }
    }

    /// Create a parser from dialect name
    pub fn from_dialect_name(name: &str) -> SqlResult<Self> {
        match name.to_lowercase().as_str() {
            "duckdb" | "motherduck" | "ducklake" => Ok(Self::duckdb()),
            "bigquery" => Ok(Self::bigquery()),
            _ => Err(SqlError::UnknownDialect(name.to_string())),
        }
    }

    /// Parse SQL into AST statements
    pub fn parse(&self, sql: &str) -> SqlResult<Vec<Statement>> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(SqlError::EmptySql);
        }

        self.dialect.parse(sql)
    }

    /// Get the dialect name
    pub fn dialect_name(&self) -> &'static str {
        self.dialect.name()
    }

    /// Borrow the underlying dialect, e.g. for reference rewriting.
    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::duckdb()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select() {
        let parser = SqlParser::duckdb();
        let stmts = parser
            .parse("SELECT id, name FROM staging.users WHERE id = 1")
            .unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_parse_empty() {
        let parser = SqlParser::duckdb();
        assert!(matches!(parser.parse("  "), Err(SqlError::EmptySql)));
    }

    #[test]
    fn test_parse_error() {
        let parser = SqlParser::duckdb();
        assert!(parser.parse("SELECT FROM").is_err());
    }

    #[test]
    fn test_from_dialect_name() {
        assert_eq!(
            SqlParser::from_dialect_name("motherduck").unwrap().dialect_name(),
            "duckdb"
        );
        assert_eq!(
            SqlParser::from_dialect_name("bigquery").unwrap().dialect_name(),
            "bigquery"
        );
        assert!(SqlParser::from_dialect_name("oracle").is_err());
    }
}
