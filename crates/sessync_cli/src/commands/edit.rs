//! Session editing commands: new, rename and delete.

use crate::context::{CliResult, Context};
use tracing::info;
use uuid::Uuid;

/// Runs the new command.
pub fn create(ctx: &Context, name: &str) -> CliResult<()> {
    let store = ctx.open_store()?;
    let info = store.create_session(name)?;
    info!(session = %info.id, "Created session");
    println!("{}", info.id);
    Ok(())
}

/// Runs the rename command.
pub fn rename(ctx: &Context, id: Uuid, name: &str) -> CliResult<()> {
    let store = ctx.open_store()?;
    let info = store.rename_session(id, name)?;
    println!("{}  {}", info.id, info.name);
    Ok(())
}

/// Runs the delete command. The remote copy goes on the next sync.
pub fn delete(ctx: &Context, id: Uuid) -> CliResult<()> {
    let store = ctx.open_store()?;
    store.delete_session(id)?;
    println!("Deleted {id}");
    Ok(())
}
