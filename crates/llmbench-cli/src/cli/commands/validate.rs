use crate::cli::output::print_json;
use crate::exit_codes;
use crate::workspace::Workspace;
use std::path::Path;

pub(crate) fn run(config: &Path, json: bool) -> anyhow::Result<i32> {
    let ws = Workspace::load(config)?;
    let tasks = ws.task_store()?;

    let providers: Vec<_> = ws
        .providers
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id,
                "name": p.display_name(),
                "type": p.provider_type.as_str(),
            })
        })
        .collect();
    let collections: Vec<_> = ws
        .collections
        .iter()
        .map(|(id, task_ids)| serde_json::json!({ "id": id, "tasks": task_ids.len() }))
        .collect();

    if json {
        print_json(&serde_json::json!({
            "providers": providers,
            "tasks": ws.tasks.len(),
            "collections": collections,
            "engine": ws.engine,
        }))?;
        return Ok(exit_codes::SUCCESS);
    }

    println!("{}: ok", config.display());
    println!("providers:");
    for p in &ws.providers {
        println!("  {} ({}) {}", p.id, p.provider_type.as_str(), p.display_name());
    }
    println!("tasks: {}", ws.tasks.len());
    println!("collections:");
    for id in tasks.collection_ids() {
        let count = ws.collections.get(&id).map(Vec::len).unwrap_or(0);
        println!("  {} ({} tasks)", id, count);
    }
    Ok(exit_codes::SUCCESS)
}
