use std::sync::Arc;

use matchd_core::{parse_command, Command, CommandError, JobDescriptor, SweepRequest};
use tracing::{debug, info, warn};

use crate::batch::BatchWriter;
use crate::error::SchedulerError;
use crate::notice::Notice;
use crate::pipeline::PipelinePlan;
use crate::types::Admission;

use super::core::Completion;
use super::Scheduler;

impl Scheduler {
    /// Start `descriptor` in a free slot, or append it to the pending queue.
    /// A job never overtakes one already waiting, even when a slot is free.
    /// Grouped jobs go to the batch writer when one is configured.
    pub fn admit(&self, descriptor: JobDescriptor) -> Result<Admission, SchedulerError> {
        if let Some(group) = descriptor.group_tag() {
            match &self.shared.batch {
                Some(writer) => return self.hand_off(writer, &descriptor, group),
                None => debug!(group, "batch submission disabled; running grouped job locally"),
            }
        }

        let command = descriptor.original_command.clone();
        let limit = self.shared.config.worker_limit;
        let admitted = {
            let mut state = self.lock_state();
            if state.pending.is_empty() && state.has_free_slot(limit) {
                Ok(state.occupy(descriptor))
            } else {
                state.pending.push_back(descriptor);
                Err((state.pending.len(), state.has_free_slot(limit)))
            }
        };

        match admitted {
            Ok((slot, job)) => {
                self.launch(slot, job);
                Ok(Admission::Started { slot })
            }
            Err((position, slot_free)) => {
                info!(position, command = %command, "job queued");
                self.notify(Notice::Queued { position, command });
                if slot_free && self.shared.completions.send(Completion::Refill).is_err() {
                    warn!("reaper stopped; job stays queued");
                }
                Ok(Admission::Queued { position })
            }
        }
    }

    /// Expand a sweep and queue every generated job, then let the reaper
    /// refill free slots in one burst. The sweep itself never holds a slot.
    /// Nothing is queued if any generated line fails to parse.
    pub fn submit_sweep(&self, request: &SweepRequest) -> Result<usize, SchedulerError> {
        let mut jobs = Vec::new();
        for line in request.expand()? {
            match parse_command(&line)? {
                Command::Submit(descriptor) => jobs.push(descriptor),
                other => {
                    return Err(CommandError::MalformedCommand(format!(
                        "sweep produced a non-job line: {other:?}"
                    ))
                    .into())
                }
            }
        }
        let count = jobs.len();

        let mut local = Vec::with_capacity(count);
        for descriptor in jobs {
            match (&self.shared.batch, descriptor.group_tag()) {
                (Some(writer), Some(group)) => {
                    self.hand_off(writer, &descriptor, group)?;
                }
                _ => local.push(descriptor),
            }
        }
        let queued = local.len();
        self.lock_state().pending.extend(local);

        info!(count, queued, command = %request.original_command, "sweep expanded");
        self.notify(Notice::SweepQueued {
            count,
            command: request.original_command.clone(),
        });
        if queued > 0 && self.shared.completions.send(Completion::Refill).is_err() {
            warn!("reaper stopped; sweep jobs stay queued");
        }
        Ok(count)
    }

    fn hand_off(
        &self,
        writer: &Arc<dyn BatchWriter>,
        descriptor: &JobDescriptor,
        group: &str,
    ) -> Result<Admission, SchedulerError> {
        let plan = PipelinePlan::for_job(descriptor, &self.shared.config.matching);
        writer.submit(&plan.stage_commands(), Some(group), &descriptor.original_command)?;
        info!(group, command = %descriptor.original_command, "job handed to batch system");
        self.notify(Notice::BatchSubmitted {
            group: group.to_string(),
            command: descriptor.original_command.clone(),
        });
        Ok(Admission::Batched { group: group.to_string() })
    }
}
