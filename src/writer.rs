use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Ambient load-generator collaborator, grounded in the original
/// `writer_thread`: repeatedly creates and deletes a small file under
/// `base_path` to exercise the Supervisor/Planner loop during manual
/// testing. It never touches the Registry or Queue directly — it is not
/// part of the core state machine, only a way to make a watched mount
/// fill up while exercising the daemon by hand.
pub async fn run(base_path: PathBuf, block_size: usize, interval: Duration, cancel: CancellationToken) {
    let payload = vec![0u8; block_size];
    let mut counter: u64 = 0;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => {
                debug!("writer shutting down");
                return;
            }
        }

        let path = base_path.join(format!("writer-{counter}.tmp"));
        counter = counter.wrapping_add(1);

        if let Err(e) = tokio::fs::write(&path, &payload).await {
            warn!(path = %path.display(), error = %e, "writer: failed to create file");
            continue;
        }
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "writer: failed to remove file");
        }
    }
}
