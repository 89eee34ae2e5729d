//! Plan command implementation: a dry run of one sync pass.

use crate::context::{CliResult, Context};
use serde::Serialize;
use sessync_engine::SyncAction;
use std::fmt::Write;

/// One planned action, as printed.
#[derive(Debug, Serialize)]
pub struct PlannedAction {
    /// Session ID.
    pub id: String,
    /// Action name.
    pub action: String,
    /// Session name from whichever side knows it.
    pub name: String,
}

impl From<&SyncAction> for PlannedAction {
    fn from(action: &SyncAction) -> Self {
        let name = action
            .local_info
            .as_ref()
            .map(|info| info.name.clone())
            .or_else(|| action.remote_meta.as_ref().map(|meta| meta.name.clone()))
            .unwrap_or_default();
        Self {
            id: action.session_id.to_string(),
            action: action.action_type.to_string(),
            name,
        }
    }
}

/// Runs the plan command.
pub fn run(ctx: &Context, format: &str) -> CliResult<()> {
    let sync = ctx.synchronizer(ctx.sync_config())?;
    let planned: Vec<PlannedAction> = sync.plan_once()?.iter().map(Into::into).collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&planned)?),
        "text" => print!("{}", render(ctx.project(), &planned)),
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}

fn render(project: &str, planned: &[PlannedAction]) -> String {
    if planned.is_empty() {
        return format!("Project {project} is in sync\n");
    }
    let mut out = String::new();
    let _ = writeln!(out, "{} action(s) for project {project}:", planned.len());
    for p in planned {
        let _ = writeln!(out, "  {:<13}  {}  {}", p.action, p.id, p.name);
    }
    out
}
