use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::notice::Notice;
use crate::state::ActiveJob;
use crate::types::{JobOutcome, SlotId};

use super::core::Completion;
use super::Scheduler;

/// The single consumer of runner completions. It is the only place that
/// removes entries from the active table.
pub(super) async fn run(scheduler: Scheduler, mut rx: mpsc::UnboundedReceiver<Completion>) {
    while let Some(completion) = rx.recv().await {
        scheduler.reap(completion);
    }
    debug!("completion channel closed; reaper exiting");
}

impl Scheduler {
    fn reap(&self, completion: Completion) {
        let limit = self.shared.config.worker_limit;
        let refill = !self.is_shutting_down();

        match completion {
            Completion::Job { slot, outcome } => {
                let (finished, started) = {
                    let mut state = self.lock_state();
                    let finished = state.release(slot);
                    let started = if refill { state.fill(limit, 1) } else { Vec::new() };
                    (finished, started)
                };
                match finished {
                    Some(job) => self.report(slot, &job, outcome),
                    None => debug!(slot, "completion for a slot that was already reaped"),
                }
                for (slot, job) in started {
                    self.launch(slot, job);
                }
            }
            Completion::Refill => {
                let started = if refill { self.lock_state().fill(limit, limit) } else { Vec::new() };
                debug!(started = started.len(), "refill from pending queue");
                for (slot, job) in started {
                    self.launch(slot, job);
                }
            }
        }
    }

    fn report(&self, slot: SlotId, job: &ActiveJob, outcome: JobOutcome) {
        let command = job.descriptor.original_command.clone();
        let elapsed = chrono::Utc::now() - job.started_at;
        match outcome {
            JobOutcome::Completed { run_log } => {
                info!(slot, command = %command, elapsed_s = elapsed.num_seconds(), "job completed");
                self.notify(Notice::Completed { slot, command });
                if let Some(path) = run_log {
                    self.notify(Notice::RunLogUpdated { path });
                }
            }
            JobOutcome::Canceled => {
                info!(slot, command = %command, "job canceled");
                self.notify(Notice::Canceled { slot, command });
            }
            JobOutcome::Failed(e) => {
                warn!(slot, command = %command, error = %e, "job failed");
                self.notify(Notice::Failed { slot, command, reason: e.to_string() });
            }
        }
    }
}
