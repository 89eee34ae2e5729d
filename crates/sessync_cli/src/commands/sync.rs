//! Sync command implementation.

use crate::context::{CliResult, Context};
use sessync_engine::SyncReport;
use std::fmt::Write;
use tracing::warn;

/// Runs the sync command.
pub fn run(ctx: &Context, max_iterations: Option<u32>, merge_before_upload: bool) -> CliResult<()> {
    let mut config = ctx.sync_config().with_merge_before_upload(merge_before_upload);
    if let Some(max) = max_iterations {
        config = config.with_max_iterations(max);
    }

    let sync = ctx.synchronizer(config)?;
    let report = sync.synchronize()?;
    if report.cap_reached {
        warn!("Sessions kept changing; run sync again to finish");
    }
    print!("{}", render(&report));

    if report.failed() > 0 {
        return Err(format!("{} action(s) failed", report.failed()).into());
    }
    Ok(())
}

fn render(report: &SyncReport) -> String {
    let mut out = String::new();
    for (i, result) in report.results.iter().enumerate() {
        let _ = writeln!(
            out,
            "Pass {}: {} succeeded, {} failed, {} skipped",
            i + 1,
            result.succeeded.len(),
            result.failed.len(),
            result.skipped.len()
        );
        let mut failed: Vec<_> = result.failed.iter().collect();
        failed.sort_by_key(|(id, _)| **id);
        for (id, err) in failed {
            let _ = writeln!(out, "  {id}: {err}");
        }
    }
    let status = if report.converged {
        "converged"
    } else {
        "not converged"
    };
    let _ = writeln!(
        out,
        "Sync {status} after {} iteration(s)",
        report.iterations
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessync_engine::{SyncError, SyncResult};
    use uuid::Uuid;

    #[test]
    fn reports_each_pass_and_failures() {
        let failed_id = Uuid::from_u128(3);
        let mut first = SyncResult::new();
        first.succeeded.push(Uuid::from_u128(1));
        first
            .failed
            .insert(failed_id, SyncError::ArchiveMissing(failed_id));
        let report = SyncReport {
            iterations: 1,
            converged: true,
            cap_reached: false,
            results: vec![first],
        };

        let out = render(&report);

        assert!(out.contains("Pass 1: 1 succeeded, 1 failed, 0 skipped"));
        assert!(out.contains(&failed_id.to_string()));
        assert!(out.ends_with("Sync converged after 1 iteration(s)\n"));
    }

    #[test]
    fn empty_report_still_has_status() {
        let report = SyncReport {
            iterations: 1,
            converged: true,
            ..Default::default()
        };
        assert_eq!(render(&report), "Sync converged after 1 iteration(s)\n");
    }
}
