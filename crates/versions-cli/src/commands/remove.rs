//! Destructive commands

use serde_json::json;
use versions_core::attrs;
use versions_engine::destroy::DESTROY_KEY;

use super::DocumentArg;
use crate::context::{refused, CliResult, Context, GlobalArgs};
use crate::render::{print_document, print_json};

pub fn drop_version(global: &GlobalArgs, args: DocumentArg) -> CliResult<()> {
    let ctx = Context::open(global)?;
    let mut document = ctx.document(args.id)?;

    if !ctx
        .documents
        .update_version(&ctx.tx, &mut document, attrs! { DESTROY_KEY => true })?
    {
        return Err(refused("updated", document.errors()));
    }

    if document.is_destroyed() {
        return print_json(&json!({ "id": args.id, "destroyed": true }));
    }
    print_document(&ctx, &mut document)
}

pub fn destroy(global: &GlobalArgs, args: DocumentArg) -> CliResult<()> {
    let ctx = Context::open(global)?;
    let mut document = ctx.document(args.id)?;

    if !ctx.documents.destroy(&ctx.tx, &mut document)? {
        return Err(refused("destroyed", document.errors()));
    }

    print_json(&json!({ "id": args.id, "destroyed": true }))
}
