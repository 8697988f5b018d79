//! List scripts, kinds and dependencies.

use anyhow::Result;
use lea_core::selector::resolve_active_set;

use crate::cli::{GlobalArgs, LsArgs};
use crate::commands::common;

pub async fn execute(args: &LsArgs, global: &GlobalArgs) -> Result<()> {
    let dag = common::load_dag(global)?;
    let active = resolve_active_set(&dag, &args.select, &[], None).map_err(common::fail_with)?;

    let order = dag.topological_order().map_err(common::fail_with)?;
    let rows: Vec<Vec<String>> = order
        .iter()
        .filter(|id| active.contains(*id))
        .filter_map(|id| dag.script(id).map(|script| (id, script)))
        .map(|(id, script)| {
            vec![
                id.dotted(),
                script.kind.to_string(),
                script.dependencies.len().to_string(),
                script.external_dependencies.len().to_string(),
                script.assertions.len().to_string(),
            ]
        })
        .collect();

    common::print_table(&["TABLE", "KIND", "DEPS", "EXTERNAL", "ASSERTIONS"], &rows);
    println!("\n{} scripts", rows.len());
    Ok(())
}
