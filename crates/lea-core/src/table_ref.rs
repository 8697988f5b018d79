//! Fully-qualified table references.
//!
//! A [`TableRef`] addresses one table produced by one script: an ordered
//! chain of schema segments plus a table name. In SQL text the chain is
//! written with the project convention `top.sub__subsub__table` — the first
//! dot separates the top-level schema, double underscores separate nested
//! sub-schemas folded into the table identifier.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal suffix marking a table as the audit (staging) copy of its
/// production counterpart. Three underscores, exactly.
pub const AUDIT_SUFFIX: &str = "___audit";

/// A fully-qualified table reference: schema segment chain + table name.
///
/// Equality is structural. `TableRef` is the node key of the DAG and the
/// unit selectors operate on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    schema: Vec<String>,
    name: String,
}

impl TableRef {
    /// Create a reference from schema segments and a table name.
    ///
    /// Returns an error when the schema chain is empty or any part is empty:
    /// every script lives under at least a top-level schema.
    pub fn new(schema: Vec<String>, name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if schema.is_empty() || schema.iter().any(|s| s.is_empty()) || name.is_empty() {
            return Err(CoreError::InvalidTableRef {
                reference: format!("{:?}.{}", schema, name),
                reason: "schema chain and table name must be non-empty".to_string(),
            });
        }
        Ok(Self { schema, name })
    }

    /// Parse a dotted reference in project syntax.
    ///
    /// `staging.orders` → `([staging], orders)`;
    /// `core.eu__users` → `([core, eu], users)`;
    /// `a.b.c` (warehouse three-part form) → `([a, b], c)`.
    ///
    /// A trailing [`AUDIT_SUFFIX`] is stripped and reported in the second
    /// tuple element so audit tables round-trip through the extractor.
    pub fn parse(reference: &str) -> CoreResult<(Self, bool)> {
        let (reference, audit) = match reference.strip_suffix(AUDIT_SUFFIX) {
            Some(base) => (base, true),
            None => (reference, false),
        };

        let parts: Vec<&str> = reference.split('.').collect();
        if parts.len() < 2 {
            return Err(CoreError::InvalidTableRef {
                reference: reference.to_string(),
                reason: "expected at least schema.table".to_string(),
            });
        }

        // All dot components but the last are schema segments; the last
        // component may fold further sub-schemas with `__`.
        let mut schema: Vec<String> = parts[..parts.len() - 1]
            .iter()
            .map(|s| s.to_string())
            .collect();

        // Safety: parts.len() >= 2 checked above
        let last = parts[parts.len() - 1];
        let mut folded: Vec<&str> = last.split("__").collect();
        // Safety: split always yields at least one element
        let name = folded.pop().unwrap_or(last);
        schema.extend(folded.iter().map(|s| s.to_string()));

        Ok((Self::new(schema, name)?, audit))
    }

    /// Top-level schema segment.
    pub fn top_schema(&self) -> &str {
        &self.schema[0]
    }

    /// Full schema segment chain.
    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    /// Bare table name (no schema, no audit suffix).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table identifier with sub-schemas folded in: `sub__subsub__table`.
    pub fn folded_name(&self) -> String {
        if self.schema.len() == 1 {
            self.name.clone()
        } else {
            let mut parts: Vec<&str> = self.schema[1..].iter().map(String::as_str).collect();
            parts.push(&self.name);
            parts.join("__")
        }
    }

    /// Project-syntax dotted form: `top.sub__table`. Round-trips through
    /// [`TableRef::parse`].
    pub fn dotted(&self) -> String {
        format!("{}.{}", self.schema[0], self.folded_name())
    }

    /// Dotted form of the audit table: `top.sub__table___audit`.
    pub fn dotted_audit(&self) -> String {
        format!("{}{}", self.dotted(), AUDIT_SUFFIX)
    }

    /// True when this reference's schema chain starts with `segments`.
    ///
    /// Used by `schema/` selectors: `staging/` matches every table whose
    /// top-level schema chain begins with `staging`.
    pub fn in_schema(&self, segments: &[String]) -> bool {
        self.schema.len() >= segments.len() && self.schema[..segments.len()] == *segments
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

#[cfg(test)]
#[path = "table_ref_test.rs"]
mod tests;
