//! Changed-script resolution for the `git` selector.
//!
//! Collects files added or modified relative to the base branch (committed,
//! staged, and unstaged) and maps those under the scripts root to their
//! table references.

use anyhow::{Context, Result};
use lea_core::table_ref::TableRef;
use std::collections::HashSet;
use std::path::Path;
use tokio::process::Command;

/// Resolve the set of tables whose source scripts changed.
pub async fn changed_tables(scripts_root: &Path, base_branch: &str) -> Result<HashSet<TableRef>> {
    let mut files: HashSet<String> = HashSet::new();

    let diff = run_git(&["diff", "--name-only", base_branch]).await?;
    files.extend(diff.lines().map(str::to_string));

    // `git status --porcelain` covers untracked new scripts.
    let status = run_git(&["status", "--porcelain"]).await?;
    files.extend(
        status
            .lines()
            .filter_map(|line| line.get(3..))
            .map(str::to_string),
    );

    let mut changed = HashSet::new();
    for file in files {
        if !file.ends_with(".sql") && !file.ends_with(".sql.jinja") {
            continue;
        }
        let path = Path::new(&file);
        let Ok(relative) = path.strip_prefix(scripts_root) else {
            continue;
        };
        if let Ok(id) = lea_parser::script_table_ref(relative) {
            changed.insert(id);
        }
    }
    Ok(changed)
}

async fn run_git(args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .output()
        .await
        .context("failed to invoke git")?;
    if !output.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
