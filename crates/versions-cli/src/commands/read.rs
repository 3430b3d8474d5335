//! Read-only commands

use std::io::Write;

use serde_json::Value as Json;

use super::DocumentArg;
use crate::context::{CliResult, Context, GlobalArgs};
use crate::render::{print_document, print_json, version_json};

pub fn show(global: &GlobalArgs, args: DocumentArg) -> CliResult<()> {
    let ctx = Context::open(global)?;
    let mut document = ctx.document(args.id)?;
    print_document(&ctx, &mut document)
}

pub fn history(global: &GlobalArgs, args: DocumentArg) -> CliResult<()> {
    let ctx = Context::open(global)?;
    let mut document = ctx.document(args.id)?;

    let versions = ctx.documents.versions(&ctx.tx, &mut document)?;
    let rendered = versions
        .iter()
        .map(|version| version_json(&ctx, version))
        .collect::<CliResult<Vec<_>>>()?;

    print_json(&Json::Array(rendered))
}

pub fn cat(global: &GlobalArgs, args: DocumentArg) -> CliResult<()> {
    let ctx = Context::open(global)?;
    let mut document = ctx.document(args.id)?;

    let Some(bytes) = ctx.documents.read_file(&ctx.tx, &mut document)? else {
        return Err(format!("document {} has no file", args.id).into());
    };
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}
