//! Scheduler runner -- admission, completion reaping, and the control surface.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructor, runner launch, and accessors
//! - `admission`: single-job admission, batch hand-off, and sweep fan-out
//! - `reaper`: the completion loop that frees slots and re-dispatches work
//! - `control`: cancel, cancel-all, and show

mod admission;
mod control;
mod core;
mod reaper;
#[cfg(test)]
mod tests;

pub use self::core::Scheduler;
