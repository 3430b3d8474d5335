//! Create and update commands

use std::path::{Path, PathBuf};

use clap::Args;
use versions_core::model::{Attributes, Value};
use versions_engine::Owner;
use versions_store::Upload;

use crate::context::{refused, CliResult, Context, GlobalArgs};
use crate::render::print_document;

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub text: Option<String>,

    /// File to attach to the first version
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Document id
    pub id: i64,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub text: Option<String>,

    /// Replace the file; forks like any other content change
    #[arg(long)]
    pub file: Option<PathBuf>,
}

fn content(title: Option<String>, text: Option<String>) -> Attributes {
    let mut attributes = Attributes::new();
    if let Some(title) = title {
        attributes.insert("title".to_string(), Value::from(title));
    }
    if let Some(text) = text {
        attributes.insert("text".to_string(), Value::from(text));
    }
    attributes
}

fn apply(
    ctx: &Context,
    document: &mut Owner,
    attributes: Attributes,
    file: Option<&Path>,
) -> CliResult<()> {
    ctx.documents
        .set_version_attributes(&ctx.tx, document, attributes)?;
    if let Some(path) = file {
        ctx.documents
            .set_file(&ctx.tx, document, Upload::from_path(path)?)?;
    }
    if !ctx.documents.save(&ctx.tx, document)? {
        return Err(refused("saved", document.errors()));
    }
    Ok(())
}

pub fn create(global: &GlobalArgs, args: CreateArgs) -> CliResult<()> {
    let ctx = Context::open(global)?;
    let mut document = ctx.documents.new_owner();

    apply(
        &ctx,
        &mut document,
        content(Some(args.title), args.text),
        args.file.as_deref(),
    )?;
    tracing::debug!(document_id = ?document.id(), "document created");

    print_document(&ctx, &mut document)
}

pub fn update(global: &GlobalArgs, args: UpdateArgs) -> CliResult<()> {
    let ctx = Context::open(global)?;
    let mut document = ctx.document(args.id)?;

    apply(
        &ctx,
        &mut document,
        content(args.title, args.text),
        args.file.as_deref(),
    )?;

    print_document(&ctx, &mut document)
}
