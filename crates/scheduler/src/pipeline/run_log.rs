use std::path::PathBuf;

use tokio::io::AsyncWriteExt;

use crate::error::SchedulerError;

/// Per-directory append-only record of completed jobs.
pub const RUN_LOG_FILE: &str = "run_log.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLogEntry {
    pub log_path: PathBuf,
    /// Copied verbatim into the entry.
    pub parameter_file: PathBuf,
    /// Directory-stripped command line.
    pub summary: String,
}

/// Append `completed: <summary>`, the parameter file, and a blank line.
pub async fn append_run_log(entry: &RunLogEntry) -> Result<PathBuf, SchedulerError> {
    let params = tokio::fs::read_to_string(&entry.parameter_file)
        .await
        .map_err(SchedulerError::RunLog)?;
    let record = format!("completed: {}\n{}\n\n", entry.summary, params);

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&entry.log_path)
        .await
        .map_err(SchedulerError::RunLog)?;
    file.write_all(record.as_bytes()).await.map_err(SchedulerError::RunLog)?;
    file.flush().await.map_err(SchedulerError::RunLog)?;
    Ok(entry.log_path.clone())
}
