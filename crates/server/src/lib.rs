//! Line-oriented TCP front end for the matchd scheduler.

pub mod dispatch;
pub mod server;

pub use dispatch::dispatch;
pub use server::{serve, WELCOME};
