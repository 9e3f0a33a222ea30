use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::batch::BatchWriter;
use crate::error::SchedulerError;
use crate::executor::Executor;
use crate::notice::Notice;
use crate::pipeline::{run_pipeline, PipelinePlan};
use crate::state::{ActiveJob, SchedulerState};
use crate::types::{JobOutcome, SchedulerConfig, SlotId};

use super::reaper;

const NOTICE_CAPACITY: usize = 1024;

/// Signals delivered to the reaper.
pub(super) enum Completion {
    /// A runner finished (normally, by failure, or by cancellation).
    Job { slot: SlotId, outcome: JobOutcome },
    /// Jobs were queued while slots may be free; fill every free slot.
    Refill,
}

pub(super) struct Shared {
    pub(super) config: SchedulerConfig,
    /// Active table and pending queue behind one lock.
    pub(super) state: Mutex<SchedulerState>,
    pub(super) executor: Arc<dyn Executor>,
    pub(super) batch: Option<Arc<dyn BatchWriter>>,
    pub(super) notices: broadcast::Sender<Notice>,
    pub(super) completions: mpsc::UnboundedSender<Completion>,
    /// Shutdown signal. Stops re-dispatch from the pending queue.
    pub(super) shutdown: AtomicBool,
    pub(super) reaper: Mutex<Option<JoinHandle<()>>>,
}

/// Cheap-to-clone handle to the job scheduler.
#[derive(Clone)]
pub struct Scheduler {
    pub(super) shared: Arc<Shared>,
}

impl Scheduler {
    /// Create a scheduler and spawn its reaper task. Must be called from
    /// within a tokio runtime.
    pub fn new(
        config: SchedulerConfig,
        executor: Arc<dyn Executor>,
        batch: Option<Arc<dyn BatchWriter>>,
    ) -> Self {
        let batch = match (config.batch_enabled, batch) {
            (true, Some(writer)) => Some(writer),
            (true, None) => {
                warn!("batch submission enabled without a writer; grouped jobs run locally");
                None
            }
            (false, _) => None,
        };
        let (completions, rx) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        info!(
            worker_limit = config.worker_limit,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            batch = batch.is_some(),
            "scheduler starting"
        );

        let scheduler = Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(SchedulerState::default()),
                executor,
                batch,
                notices,
                completions,
                shutdown: AtomicBool::new(false),
                reaper: Mutex::new(None),
            }),
        };
        let handle = tokio::spawn(reaper::run(scheduler.clone(), rx));
        *lock(&scheduler.shared.reaper) = Some(handle);
        scheduler
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Receive every notice emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.shared.notices.subscribe()
    }

    pub fn active_count(&self) -> usize {
        self.lock_state().active.len()
    }

    pub fn pending_count(&self) -> usize {
        self.lock_state().pending.len()
    }

    /// Active slots and their commands, in slot order.
    pub fn active_slots(&self) -> Vec<(SlotId, String)> {
        self.lock_state()
            .active
            .iter()
            .map(|(slot, job)| (*slot, job.descriptor.original_command.clone()))
            .collect()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    /// Stop re-dispatching, cancel everything, and wait up to `grace` for
    /// active runners to be reaped before stopping the reaper.
    pub async fn shutdown(&self, grace: Duration) {
        info!("scheduler shutdown requested");
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.cancel_all();

        let deadline = tokio::time::Instant::now() + grace;
        while self.active_count() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let remaining = self.active_count();
        if remaining > 0 {
            warn!(remaining, "shutdown grace period elapsed with jobs still active");
        }
        if let Some(handle) = lock(&self.shared.reaper).take() {
            handle.abort();
        }
        info!("scheduler stopped");
    }

    pub(super) fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        lock(&self.shared.state)
    }

    pub(super) fn notify(&self, notice: Notice) {
        // No subscribers is fine.
        let _ = self.shared.notices.send(notice);
    }

    /// Start the pipeline runner for a job that already holds `slot`.
    pub(super) fn launch(&self, slot: SlotId, job: ActiveJob) {
        let command = job.descriptor.original_command.clone();
        info!(slot, command = %command, "job started");
        self.notify(Notice::Started { slot, command });

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            // The runner gets its own task so a panic still reaches the reaper.
            let runner = {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    let plan = PipelinePlan::for_job(&job.descriptor, &shared.config.matching);
                    run_pipeline(shared.executor.as_ref(), &plan, &job.cancel, shared.config.poll_interval)
                        .await
                })
            };
            let outcome = match runner.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(slot, error = %e, "pipeline runner aborted");
                    JobOutcome::Failed(SchedulerError::RunnerAborted(e.to_string()))
                }
            };
            if shared.completions.send(Completion::Job { slot, outcome }).is_err() {
                warn!(slot, "reaper stopped; completion dropped");
            }
        });
    }
}

/// Lock a mutex, recovering the data if a holder panicked.
pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
