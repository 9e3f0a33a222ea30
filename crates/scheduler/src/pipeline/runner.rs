use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{append_run_log, remove_partial_outputs, PipelinePlan, Stage};
use crate::cancel::CancelFlag;
use crate::error::SchedulerError;
use crate::executor::{Executor, ProcessState};
use crate::types::JobOutcome;

enum StageResult {
    Succeeded,
    Canceled,
    Failed(SchedulerError),
}

/// Run every stage of `plan` in order, polling each process every
/// `poll_interval` and checking `cancel` on each tick.
pub async fn run_pipeline(
    executor: &dyn Executor,
    plan: &PipelinePlan,
    cancel: &CancelFlag,
    poll_interval: Duration,
) -> JobOutcome {
    for stage in &plan.stages {
        if cancel.is_canceled() {
            return canceled(plan).await;
        }
        match run_stage(executor, stage, cancel, poll_interval).await {
            StageResult::Succeeded => {}
            StageResult::Canceled => return canceled(plan).await,
            // Partial files stay on disk for inspection.
            StageResult::Failed(e) => return JobOutcome::Failed(e),
        }
    }

    let run_log = match &plan.run_log {
        Some(entry) => match append_run_log(entry).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "job finished but the run log was not updated");
                None
            }
        },
        None => None,
    };
    JobOutcome::Completed { run_log }
}

async fn run_stage(
    executor: &dyn Executor,
    stage: &Stage,
    cancel: &CancelFlag,
    poll_interval: Duration,
) -> StageResult {
    let stage_name = stage.kind.name();
    let mut handle = match executor.spawn(&stage.command, &stage.cwd) {
        Ok(h) => h,
        Err(e) => return StageResult::Failed(SchedulerError::Spawn(e)),
    };
    debug!(stage = stage_name, command = %stage.command, "stage started");

    let mut tick = interval(poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        match handle.poll() {
            Err(e) => return StageResult::Failed(SchedulerError::Poll(e)),
            Ok(ProcessState::Exited { code: Some(0) }) => {
                debug!(stage = stage_name, "stage finished");
                return StageResult::Succeeded;
            }
            Ok(ProcessState::Exited { code }) => {
                return StageResult::Failed(SchedulerError::ExecutionFailure { stage: stage_name, code });
            }
            Ok(ProcessState::Running) => {
                if cancel.is_canceled() {
                    if let Err(e) = handle.terminate_group() {
                        warn!(stage = stage_name, error = %e, "failed to terminate process group");
                    }
                    info!(stage = stage_name, command = %stage.command, "stage terminated");
                    return StageResult::Canceled;
                }
            }
        }
    }
}

async fn canceled(plan: &PipelinePlan) -> JobOutcome {
    remove_partial_outputs(&plan.cleanup).await;
    JobOutcome::Canceled
}
