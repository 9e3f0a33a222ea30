//! Scheduling and concurrency engine for MATCH jobs.
//!
//! A [`Scheduler`] admits jobs against a worker limit, queues the overflow
//! in FIFO order, runs each admitted job as a staged process pipeline, and
//! re-dispatches queued work as runners finish. Cancellation is cooperative:
//! runners poll a [`CancelFlag`] and terminate their process group.

pub mod batch;
pub mod cancel;
pub mod error;
pub mod executor;
pub mod notice;
pub mod pipeline;
pub mod runner;
pub mod slots;
pub mod state;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchWriter, FileBatchWriter};
pub use cancel::CancelFlag;
pub use error::{BatchError, SchedulerError};
pub use executor::{Executor, ProcessHandle, ProcessState, ShellExecutor};
pub use notice::Notice;
pub use runner::Scheduler;
pub use slots::next_slot;
pub use types::{Admission, CancelAllSummary, CancelOutcome, JobOutcome, SchedulerConfig, SlotId};
