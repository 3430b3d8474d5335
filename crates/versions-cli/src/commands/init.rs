//! Store initialisation

use serde_json::json;
use versions_store::migrations::applied_migrations;

use crate::context::{CliResult, Context, GlobalArgs};
use crate::render::print_json;

pub fn execute(global: &GlobalArgs) -> CliResult<()> {
    let ctx = Context::open(global)?;
    let migrations = applied_migrations(ctx.tx.connection())?;

    print_json(&json!({
        "db": ctx.config.db_path.display().to_string(),
        "attachments": ctx.config.attachments_root.display().to_string(),
        "migrations": migrations,
    }))
}
