use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, warn};

/// Best-effort removal of a canceled job's partial outputs. Missing files
/// are skipped silently.
pub async fn remove_partial_outputs(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "removed partial output");
                removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove partial output"),
        }
    }
    removed
}
