//! Inline annotation scanning.
//!
//! Assertions are declared as SQL line comments sitting directly above the
//! SELECT-list column they apply to:
//!
//! ```sql
//! SELECT
//!     -- #UNIQUE
//!     -- #NO_NULLS
//!     user_id,
//!     -- #SET{'A', 'B', 'AB', 'O'}
//!     blood_type
//! FROM staging.users
//! ```
//!
//! The scanner is line-based: annotation comments accumulate until the next
//! non-comment, non-blank line, whose SELECT-list expression names the
//! column (its alias, or the trailing path segment of a plain identifier).
//! Legacy `@INCREMENTAL` and `@UNIQUE` spellings are accepted.

use crate::error::{SqlError, SqlResult};
use regex::Regex;
use std::sync::LazyLock;

/// Matches `#KEYWORD` (and legacy `@KEYWORD`) tokens inside a comment.
static ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#@]([A-Z_]+)").expect("hardcoded regex is valid"));

/// A bare column identifier.
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("hardcoded regex is valid"));

/// An `AS` alias separator, case-insensitive.
static AS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+as\s+").expect("hardcoded regex is valid"));

/// Clause keywords that end the SELECT list — an annotation still pending
/// when one of these starts a line is dangling.
const CLAUSE_KEYWORDS: &[&str] = &[
    "from", "where", "group", "having", "order", "qualify", "window", "limit", "union",
    "intersect", "except", "join", "left", "right", "inner", "full", "cross", "on", ")",
];

/// One parsed annotation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationKind {
    NoNulls,
    Unique,
    UniqueBy(Vec<String>),
    Set(Vec<String>),
    Incremental,
    ClusteringField,
}

/// An annotation resolved to its column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAnnotation {
    pub column: String,
    pub kind: AnnotationKind,
    /// 1-based source line of the annotation comment.
    pub line: usize,
}

/// Scan SQL text for inline annotations.
///
/// Unknown `#KEYWORD` tokens are ignored with a warning. A malformed
/// argument list (unterminated `#SET{` or `#UNIQUE_BY(`) is an error
/// carrying the offending line.
pub fn scan_annotations(sql: &str) -> SqlResult<Vec<ColumnAnnotation>> {
    let mut out = Vec::new();
    let mut pending: Vec<(AnnotationKind, usize)> = Vec::new();

    for (idx, raw_line) in sql.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim();

        if trimmed.is_empty() {
            continue;
        }

        if let Some(comment) = trimmed.strip_prefix("--") {
            pending.extend(parse_comment(comment, line_no)?);
            continue;
        }

        if pending.is_empty() {
            continue;
        }

        // Strip any trailing inline comment before inspecting the expression.
        let expr = match trimmed.find("--") {
            Some(pos) => trimmed[..pos].trim_end(),
            None => trimmed,
        };

        let lowered = expr.to_lowercase();
        let rest = if lowered == "select" || lowered == "select distinct" {
            ""
        } else if let Some(r) = lowered
            .strip_prefix("select distinct ")
            .map(|_| &expr["select distinct ".len()..])
        {
            r
        } else if let Some(r) = lowered.strip_prefix("select ").map(|_| &expr["select ".len()..]) {
            r
        } else {
            expr
        };

        if rest.is_empty() {
            // A lone SELECT keyword; the column is on a following line.
            continue;
        }

        let first_word = lowered.split_whitespace().next().unwrap_or("");
        if CLAUSE_KEYWORDS.contains(&first_word) {
            for (kind, line) in pending.drain(..) {
                log::warn!("annotation {kind:?} at line {line} precedes no SELECT column, ignored");
            }
            continue;
        }

        match column_of_expression(rest) {
            Some(column) => {
                for (kind, line) in pending.drain(..) {
                    out.push(ColumnAnnotation {
                        column: column.clone(),
                        kind,
                        line,
                    });
                }
            }
            None => {
                for (kind, line) in pending.drain(..) {
                    log::warn!(
                        "annotation {kind:?} at line {line} precedes an unnamed expression, ignored"
                    );
                }
            }
        }
    }

    for (kind, line) in pending {
        log::warn!("annotation {kind:?} at line {line} precedes no SELECT column, ignored");
    }

    Ok(out)
}

/// Parse the annotation tokens of one comment line.
fn parse_comment(comment: &str, line: usize) -> SqlResult<Vec<(AnnotationKind, usize)>> {
    let mut found = Vec::new();

    for cap in ANNOTATION_RE.captures_iter(comment) {
        // Safety: group 0 and 1 always exist on a match of this regex
        let whole = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
        let keyword = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
        let after = cap
            .get(0)
            .map(|m| &comment[m.end()..])
            .unwrap_or_default();
        let legacy = whole.starts_with('@');

        let kind = match keyword {
            "NO_NULLS" if !legacy => AnnotationKind::NoNulls,
            "UNIQUE" => AnnotationKind::Unique,
            "UNIQUE_BY" if !legacy => {
                AnnotationKind::UniqueBy(parse_args(after, '(', ')', "#UNIQUE_BY", line)?)
            }
            "SET" if !legacy => {
                AnnotationKind::Set(parse_args(after, '{', '}', "#SET", line)?)
            }
            "INCREMENTAL" => AnnotationKind::Incremental,
            "CLUSTERING_FIELD" if !legacy => AnnotationKind::ClusteringField,
            other => {
                if !legacy {
                    log::warn!("unknown annotation #{other} at line {line}, ignored");
                }
                continue;
            }
        };

        found.push((kind, line));
    }

    Ok(found)
}

/// Parse a delimited argument list directly following an annotation keyword.
fn parse_args(
    after: &str,
    open: char,
    close: char,
    keyword: &str,
    line: usize,
) -> SqlResult<Vec<String>> {
    let after = after.trim_start();
    let Some(body) = after.strip_prefix(open) else {
        return Err(SqlError::MalformedAnnotation {
            keyword: keyword.to_string(),
            line,
            reason: format!("expected '{open}' after keyword"),
        });
    };
    let Some(end) = body.find(close) else {
        return Err(SqlError::MalformedAnnotation {
            keyword: keyword.to_string(),
            line,
            reason: format!("unterminated '{open}'"),
        });
    };

    Ok(body[..end]
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect())
}

/// The column name of a SELECT-list expression line.
///
/// `total AS amount,` → `amount`; `u.email,` → `email`; `email` → `email`.
/// Expressions with no alias and no identifier shape yield `None`.
fn column_of_expression(expr: &str) -> Option<String> {
    let expr = expr.trim().trim_end_matches(',').trim();
    if expr.is_empty() {
        return None;
    }

    let candidate = match AS_RE.find_iter(expr).last() {
        Some(m) => expr[m.end()..].trim(),
        // Without an alias, only a plain (possibly qualified) identifier
        // names a column; anything with spaces or calls does not.
        None if expr.contains(char::is_whitespace) || expr.contains('(') => return None,
        None => expr,
    };

    // Take the trailing path segment (`u.email` → `email`) and strip quoting.
    // Safety: str::split() always yields at least one element
    let candidate = candidate.split('.').next_back().unwrap_or(candidate);
    let candidate = candidate.trim_matches(|c| c == '"' || c == '`');

    if IDENT_RE.is_match(candidate) {
        Some(candidate.to_string())
    } else {
        None
    }
}

#[cfg(test)]
#[path = "annotations_test.rs"]
mod tests;
