use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use matchd_core::JobDescriptor;

use crate::cancel::CancelFlag;
use crate::slots::next_slot;
use crate::types::SlotId;

/// A descriptor bound to a worker slot for the lifetime of its runner.
#[derive(Debug, Clone)]
pub struct ActiveJob {
    pub descriptor: JobDescriptor,
    pub cancel: CancelFlag,
    pub started_at: DateTime<Utc>,
}

/// Active table plus pending queue. Always accessed under the scheduler's
/// single mutex; nothing awaits while it is held.
#[derive(Debug, Default)]
pub struct SchedulerState {
    /// Slot -> job. Ordered so that listings come out in slot order.
    pub active: BTreeMap<SlotId, ActiveJob>,
    /// FIFO backlog. Duplicates are allowed.
    pub pending: VecDeque<JobDescriptor>,
}

impl SchedulerState {
    pub fn has_free_slot(&self, worker_limit: usize) -> bool {
        self.active.len() < worker_limit
    }

    /// Bind `descriptor` to the smallest free slot. Callers check
    /// [`has_free_slot`](Self::has_free_slot) first.
    pub fn occupy(&mut self, descriptor: JobDescriptor) -> (SlotId, ActiveJob) {
        let slot = next_slot(self.active.keys().copied());
        let job = ActiveJob {
            descriptor,
            cancel: CancelFlag::new(),
            started_at: Utc::now(),
        };
        self.active.insert(slot, job.clone());
        (slot, job)
    }

    /// Move up to `max` pending descriptors into free slots, oldest first.
    pub fn fill(&mut self, worker_limit: usize, max: usize) -> Vec<(SlotId, ActiveJob)> {
        let mut started = Vec::new();
        while started.len() < max && self.has_free_slot(worker_limit) {
            let Some(descriptor) = self.pending.pop_front() else {
                break;
            };
            started.push(self.occupy(descriptor));
        }
        started
    }

    /// Remove a finished slot. Returns `None` if it was already reaped.
    pub fn release(&mut self, slot: SlotId) -> Option<ActiveJob> {
        self.active.remove(&slot)
    }
}
