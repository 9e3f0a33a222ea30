use std::path::PathBuf;
use std::time::Duration;

use matchd_core::config::MatchConfig;
use matchd_core::Config;

use crate::error::SchedulerError;

/// Worker slot identifier, `1..=worker_limit`.
pub type SlotId = usize;

/// Runtime settings for a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of jobs executing at once.
    pub worker_limit: usize,
    /// Interval between completion polls / cancellation checks.
    pub poll_interval: Duration,
    /// Where the MATCH tools and post-processing scripts live.
    pub matching: MatchConfig,
    /// Route `-group=` jobs to the batch writer instead of running them.
    pub batch_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_limit: 8,
            poll_interval: Duration::from_millis(500),
            matching: MatchConfig::default(),
            batch_enabled: false,
        }
    }
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            worker_limit: config.scheduler.worker_limit,
            poll_interval: Duration::from_millis(config.scheduler.poll_interval_ms),
            matching: config.matching.clone(),
            batch_enabled: config.batch.enabled,
        }
    }
}

/// What `admit` did with a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A runner was started in this slot.
    Started { slot: SlotId },
    /// Appended to the pending queue at this 1-based position.
    Queued { position: usize },
    /// Handed to the batch writer; never occupies a slot.
    Batched { group: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// An active job was marked for cancellation.
    Active { slot: SlotId },
    /// A queued entry was removed before it ever ran.
    Queued,
    NotFound,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancelAllSummary {
    pub queued_removed: usize,
    pub active_marked: usize,
}

/// How a pipeline runner finished.
#[derive(Debug)]
pub enum JobOutcome {
    Completed { run_log: Option<PathBuf> },
    Canceled,
    Failed(SchedulerError),
}
