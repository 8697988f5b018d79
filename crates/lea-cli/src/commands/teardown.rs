//! Drop the target namespace.

use anyhow::Result;
use lea_core::error::CoreError;

use crate::cli::{GlobalArgs, TeardownArgs};
use crate::commands::common;

pub async fn execute(args: &TeardownArgs, global: &GlobalArgs) -> Result<()> {
    let env = common::resolve_env(global)?;

    if env.is_prod() && !args.yes {
        return Err(common::fail_with(CoreError::ConfigInvalid {
            message: "tearing down production requires --yes".to_string(),
        }));
    }

    let warehouse = common::create_warehouse(global, env.clone())?;
    warehouse.teardown().await?;
    println!("Dropped {env} namespace.");
    Ok(())
}
