//! Directory walk and script construction.

use crate::error::{ParserError, ParserResult};
use chrono::{DateTime, Utc};
use lea_core::script::{Assertion, Script, ScriptKind};
use lea_core::table_ref::TableRef;
use lea_jinja::JinjaEnvironment;
use lea_sql::annotations::AnnotationKind;
use lea_sql::SqlParser;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Top-level directory holding singular tests.
const TESTS_DIR: &str = "tests";

/// Extensions a script file may carry.
const SQL_EXT: &str = ".sql";
const JINJA_EXT: &str = ".sql.jinja";

/// Walk `root` and parse every script into a [`Script`] record.
///
/// Scripts are returned sorted by id. Dependencies on tables produced by
/// other scripts in the set become graph-internal; everything else lands in
/// `external_dependencies`.
pub fn parse_scripts(root: &Path, sql_parser: &SqlParser) -> ParserResult<Vec<Script>> {
    if !root.is_dir() {
        return Err(ParserError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let jinja = JinjaEnvironment::new(root);
    let mut drafts: Vec<ScriptDraft> = Vec::new();
    let mut seen: HashMap<TableRef, PathBuf> = HashMap::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| ParserError::Io {
            path: root.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        let is_jinja = file_name.ends_with(JINJA_EXT);
        if !is_jinja && !file_name.ends_with(SQL_EXT) {
            continue;
        }

        let draft = parse_one(root, entry.path(), is_jinja, sql_parser, &jinja)?;
        if let Some(first) = seen.get(&draft.script.id) {
            return Err(ParserError::DuplicateScript {
                id: draft.script.id.dotted(),
                first: first.clone(),
                second: entry.path().to_path_buf(),
            });
        }
        seen.insert(draft.script.id.clone(), entry.path().to_path_buf());
        drafts.push(draft);
    }

    Ok(partition_dependencies(drafts))
}

/// A parsed script whose dependencies are still raw source references.
struct ScriptDraft {
    script: Script,
    referenced: BTreeSet<String>,
}

/// Parse a single script file.
fn parse_one(
    root: &Path,
    path: &Path,
    is_jinja: bool,
    sql_parser: &SqlParser,
    jinja: &JinjaEnvironment<'_>,
) -> ParserResult<ScriptDraft> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let id = script_table_ref(relative).map_err(|e| match e {
        ParserError::ScriptOutsideSchema { .. } => ParserError::ScriptOutsideSchema {
            path: path.to_path_buf(),
        },
        other => other,
    })?;
    let kind = if relative
        .components()
        .next()
        .is_some_and(|c| c.as_os_str().to_str() == Some(TESTS_DIR))
    {
        ScriptKind::TestSingular
    } else {
        ScriptKind::Regular
    };

    let raw = std::fs::read_to_string(path).map_err(|e| ParserError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut mtime = file_mtime(path)?;
    let sql = if is_jinja {
        let rendered = jinja.render(&raw).map_err(|e| ParserError::Template {
            path: path.to_path_buf(),
            source: e,
        })?;
        for yaml in jinja.loaded_yaml_paths() {
            mtime = mtime.max(file_mtime(&yaml)?);
        }
        rendered
    } else {
        raw
    };

    let statements = sql_parser.parse(&sql).map_err(|e| ParserError::Script {
        path: path.to_path_buf(),
        source: e,
    })?;
    let referenced: BTreeSet<String> = lea_sql::extract_dependencies(&statements)
        .into_iter()
        .collect();

    let mut assertions = Vec::new();
    let mut incremental_key = None;
    let mut clustering_fields = Vec::new();

    let annotations = lea_sql::scan_annotations(&sql).map_err(|e| ParserError::Script {
        path: path.to_path_buf(),
        source: e,
    })?;
    if kind == ScriptKind::Regular {
        for ann in annotations {
            match ann.kind {
                AnnotationKind::NoNulls => assertions.push(Assertion::NoNulls { column: ann.column }),
                AnnotationKind::Unique => assertions.push(Assertion::Unique { column: ann.column }),
                AnnotationKind::UniqueBy(by) => {
                    assertions.push(Assertion::UniqueBy { column: ann.column, by })
                }
                AnnotationKind::Set(values) => {
                    assertions.push(Assertion::Set { column: ann.column, values })
                }
                AnnotationKind::Incremental => {
                    if let Some(ref existing) = incremental_key {
                        log::warn!(
                            "{}: duplicate #INCREMENTAL (already on {existing}), ignored",
                            path.display()
                        );
                    } else {
                        incremental_key = Some(ann.column);
                    }
                }
                AnnotationKind::ClusteringField => clustering_fields.push(ann.column),
            }
        }
    } else if !annotations.is_empty() {
        log::warn!(
            "{}: assertion annotations on test scripts are ignored",
            path.display()
        );
    }

    Ok(ScriptDraft {
        script: Script {
            id,
            kind,
            path: path.to_path_buf(),
            sql,
            dependencies: BTreeSet::new(),
            external_dependencies: BTreeSet::new(),
            assertions,
            mtime,
            incremental_key,
            clustering_fields,
        },
        referenced,
    })
}

/// Derive a script's table reference from its root-relative path.
///
/// `a/b/table.sql` → `TableRef([a, b], table)`. Files directly under the
/// root are rejected: every script must live in a schema. A `__` in the
/// file stem folds further sub-schemas, matching the reference syntax.
pub fn script_table_ref(relative: &Path) -> ParserResult<TableRef> {
    let components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if components.len() < 2 {
        return Err(ParserError::ScriptOutsideSchema {
            path: relative.to_path_buf(),
        });
    }

    // Safety: len >= 2 checked above
    let file_name = &components[components.len() - 1];
    let stem = file_name
        .strip_suffix(JINJA_EXT)
        .or_else(|| file_name.strip_suffix(SQL_EXT))
        .unwrap_or(file_name);

    let dotted = format!("{}.{}", components[..components.len() - 1].join("."), stem);
    let (id, _) = TableRef::parse(&dotted)?;
    Ok(id)
}

/// Split each draft's raw references into graph-internal dependencies and
/// external tables.
fn partition_dependencies(drafts: Vec<ScriptDraft>) -> Vec<Script> {
    let produced: BTreeSet<TableRef> = drafts.iter().map(|d| d.script.id.clone()).collect();

    let mut scripts: Vec<Script> = drafts
        .into_iter()
        .map(|draft| {
            let mut script = draft.script;
            for reference in draft.referenced {
                match TableRef::parse(&reference) {
                    // Audit references resolve to their base table.
                    Ok((target, _audit)) if produced.contains(&target) => {
                        // A script reading its own table (incremental
                        // pattern) is not a graph edge.
                        if target != script.id {
                            script.dependencies.insert(target);
                        }
                    }
                    _ => {
                        script.external_dependencies.insert(reference);
                    }
                }
            }
            script
        })
        .collect();

    scripts.sort_by(|a, b| a.id.cmp(&b.id));
    scripts
}

/// File modification time as a UTC timestamp.
fn file_mtime(path: &Path) -> ParserResult<DateTime<Utc>> {
    let meta = std::fs::metadata(path).map_err(|e| ParserError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let modified = meta.modified().map_err(|e| ParserError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(DateTime::<Utc>::from(modified))
}

#[cfg(test)]
#[path = "discover_test.rs"]
mod tests;
