use matchd_core::CommandError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("failed to spawn stage process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to poll stage process: {0}")]
    Poll(#[source] std::io::Error),

    #[error("{stage} stage exited with {}", describe_exit(.code))]
    ExecutionFailure { stage: &'static str, code: Option<i32> },

    #[error("batch submission failed: {0}")]
    Batch(#[from] BatchError),

    #[error("failed to update run log: {0}")]
    RunLog(#[source] std::io::Error),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("pipeline runner aborted: {0}")]
    RunnerAborted(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "a signal".to_string(),
    }
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("batch file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("batch file already holds the maximum of {max} entries")]
    Full { max: usize },
}
