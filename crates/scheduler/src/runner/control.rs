use matchd_core::ShowScope;
use tracing::info;

use crate::types::{CancelAllSummary, CancelOutcome};

use super::Scheduler;

pub const NO_QUEUED: &str = "no queued commands";
pub const NO_THREADS: &str = "no current threads running";
pub const NO_COMMANDS: &str = "no commands to show";

impl Scheduler {
    /// Empty the pending queue and mark every active job for cancellation.
    /// Returns immediately; runners stop on their next poll tick.
    pub fn cancel_all(&self) -> CancelAllSummary {
        let summary = {
            let mut state = self.lock_state();
            let queued_removed = state.pending.len();
            state.pending.clear();
            for job in state.active.values() {
                job.cancel.cancel();
            }
            CancelAllSummary { queued_removed, active_marked: state.active.len() }
        };
        info!(
            queued_removed = summary.queued_removed,
            active_marked = summary.active_marked,
            "cancel all"
        );
        summary
    }

    /// Cancel by exact original command text: an active job not yet marked
    /// first, otherwise the first equal entry in the pending queue. Repeating
    /// the request for a job that is already stopping reports that job again.
    pub fn cancel_match(&self, text: &str) -> CancelOutcome {
        let outcome = {
            let mut state = self.lock_state();
            let mut unmarked = None;
            let mut stopping = None;
            for (slot, job) in state.active.iter().filter(|(_, j)| j.descriptor.original_command == text) {
                if !job.cancel.is_canceled() {
                    job.cancel.cancel();
                    unmarked = Some(*slot);
                    break;
                }
                if stopping.is_none() {
                    stopping = Some(*slot);
                }
            }
            match unmarked {
                Some(slot) => CancelOutcome::Active { slot },
                None => match state.pending.iter().position(|d| d.original_command == text) {
                    Some(i) => {
                        state.pending.remove(i);
                        CancelOutcome::Queued
                    }
                    None => stopping.map_or(CancelOutcome::NotFound, |slot| CancelOutcome::Active { slot }),
                },
            }
        };
        match outcome {
            CancelOutcome::Active { slot } => info!(slot, command = text, "canceling running job"),
            CancelOutcome::Queued => info!(command = text, "canceled queued job"),
            CancelOutcome::NotFound => info!(command = text, "no job matches cancel request"),
        }
        outcome
    }

    /// Snapshot of pending and/or active commands, one per line. Read-only.
    pub fn show(&self, scope: ShowScope) -> Vec<String> {
        let state = self.lock_state();
        let queued = state.pending.iter().map(|d| d.original_command.clone());
        let running = state.active.values().map(|j| j.descriptor.original_command.clone());

        let (lines, empty): (Vec<String>, &str) = match scope {
            ShowScope::Queue => (queued.collect(), NO_QUEUED),
            ShowScope::Threads => (running.collect(), NO_THREADS),
            ShowScope::All => (queued.chain(running).collect(), NO_COMMANDS),
        };
        if lines.is_empty() {
            vec![empty.to_string()]
        } else {
            lines
        }
    }
}
