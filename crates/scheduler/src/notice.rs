use std::fmt;
use std::path::PathBuf;

use crate::types::SlotId;

/// Asynchronous event broadcast to every connected client, one line each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Started { slot: SlotId, command: String },
    Queued { position: usize, command: String },
    Completed { slot: SlotId, command: String },
    Canceled { slot: SlotId, command: String },
    Failed { slot: SlotId, command: String, reason: String },
    RunLogUpdated { path: PathBuf },
    BatchSubmitted { group: String, command: String },
    SweepQueued { count: usize, command: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Started { slot, command } => write!(f, "started [slot {slot}]: {command}"),
            Notice::Queued { position, command } => write!(f, "queued (position {position}): {command}"),
            Notice::Completed { slot, command } => write!(f, "completed [slot {slot}]: {command}"),
            Notice::Canceled { slot, command } => write!(f, "canceled [slot {slot}]: {command}"),
            Notice::Failed { slot, command, reason } => {
                write!(f, "failed [slot {slot}]: {command} ({reason})")
            }
            Notice::RunLogUpdated { path } => write!(f, "run log updated: {}", path.display()),
            Notice::BatchSubmitted { group, command } => {
                write!(f, "batch submitted (group {group}): {command}")
            }
            Notice::SweepQueued { count, command } => write!(f, "sweep queued {count} commands: {command}"),
        }
    }
}
