pub mod config;
pub mod descriptor;
pub mod error;
pub mod parser;
pub mod sweep;

pub use config::Config;
pub use descriptor::*;
pub use error::*;
pub use parser::{parse_command, Command, ShowScope, SweepRequest};
pub use sweep::{DavRange, Sweep};
