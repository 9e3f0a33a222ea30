//! Turn one client line into scheduler actions and reply lines.

use matchd_core::{parse_command, Command};
use matchd_scheduler::{Admission, CancelOutcome, Scheduler};
use tracing::warn;

/// Handle one line and return the synchronous reply for the requester.
/// Asynchronous notices are broadcast separately by the scheduler.
pub fn dispatch(scheduler: &Scheduler, line: &str) -> Vec<String> {
    let command = match parse_command(line) {
        Ok(c) => c,
        Err(e) => {
            warn!(line, error = %e, "rejected command");
            return vec![format!("error: {e}")];
        }
    };

    match command {
        Command::Submit(descriptor) => match scheduler.admit(descriptor) {
            Ok(Admission::Started { slot }) => vec![format!("ok: running in slot {slot}")],
            Ok(Admission::Queued { position }) => vec![format!("ok: queued at position {position}")],
            Ok(Admission::Batched { group }) => vec![format!("ok: submitted to batch group {group}")],
            Err(e) => {
                warn!(line, error = %e, "admission failed");
                vec![format!("error: {e}")]
            }
        },
        Command::Sweep(request) => match scheduler.submit_sweep(&request) {
            Ok(count) => vec![format!("ok: sweep expanded into {count} commands")],
            Err(e) => {
                warn!(line, error = %e, "sweep failed");
                vec![format!("error: {e}")]
            }
        },
        Command::CancelAll => {
            let summary = scheduler.cancel_all();
            vec![format!(
                "ok: cleared {} queued, canceling {} running",
                summary.queued_removed, summary.active_marked
            )]
        }
        Command::Cancel(target) => match scheduler.cancel_match(&target) {
            CancelOutcome::Active { slot } => vec![format!("ok: canceling [slot {slot}]: {target}")],
            CancelOutcome::Queued => vec![format!("ok: removed from queue: {target}")],
            CancelOutcome::NotFound => vec![format!("not found: {target}")],
        },
        Command::Show(scope) => scheduler.show(scope),
    }
}
