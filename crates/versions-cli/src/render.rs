//! JSON output

use serde_json::{json, Map, Value as Json};
use versions_core_types::RecordId;
use versions_engine::{Owner, Version};

use crate::context::{CliResult, Context};

pub fn print_json(value: &Json) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn version_json(ctx: &Context, version: &Version) -> CliResult<Json> {
    let mut map = Map::new();
    for (name, value) in version.record().attributes() {
        map.insert(name.clone(), serde_json::to_value(value)?);
    }
    map.insert("id".to_string(), json!(version.id().map(RecordId::get)));
    let file = ctx.documents.versioned().file_path(&ctx.tx, version)?;
    map.insert(
        "file".to_string(),
        json!(file.map(|p| p.display().to_string())),
    );
    Ok(Json::Object(map))
}

pub fn document_json(ctx: &Context, document: &mut Owner) -> CliResult<Json> {
    let version_count = ctx.documents.count_versions(&ctx.tx, document)?;
    let current = match ctx.documents.pointer(document) {
        Some(_) => {
            let version = ctx.documents.version(&ctx.tx, document)?;
            version_json(ctx, version)?
        }
        None => Json::Null,
    };
    Ok(json!({
        "id": document.id().map(RecordId::get),
        "version_count": version_count,
        "current_version": current,
    }))
}

pub fn print_document(ctx: &Context, document: &mut Owner) -> CliResult<()> {
    let rendered = document_json(ctx, document)?;
    print_json(&rendered)
}
