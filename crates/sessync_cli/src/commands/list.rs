//! List command implementation.

use crate::context::{CliResult, Context};
use sessync_engine::SessionInfo;
use std::fmt::Write;

/// Runs the list command.
pub fn run(ctx: &Context, format: &str) -> CliResult<()> {
    let store = ctx.open_store()?;
    let sessions = store.list_sessions();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&sessions)?),
        "text" => print!("{}", render(&sessions)),
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}

fn render(sessions: &[SessionInfo]) -> String {
    if sessions.is_empty() {
        return "No sessions\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:<36}  {:>13}  {:>13}  NAME", "ID", "CREATED", "MODIFIED");
    for s in sessions {
        let _ = writeln!(
            out,
            "{:<36}  {:>13}  {:>13}  {}",
            s.id, s.created, s.modified, s.name
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn renders_one_row_per_session() {
        let sessions = vec![
            SessionInfo::new(Uuid::from_u128(1), "First", 10, 20),
            SessionInfo::new(Uuid::from_u128(2), "Second", 5, 5),
        ];

        let out = render(&sessions);
        let lines: Vec<_> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains(&Uuid::from_u128(1).to_string()));
        assert!(lines[1].ends_with("First"));
        assert!(lines[2].ends_with("Second"));
    }

    #[test]
    fn empty_list_says_so() {
        assert_eq!(render(&[]), "No sessions\n");
    }
}
