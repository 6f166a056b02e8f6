use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tokio::time::interval;
use tracing::{debug, info, warn};

use vget_core::CleanupSection;

/// Periodic removal of aged artifacts from the media directory. Runs until
/// the process exits.
pub async fn run(media_dir: PathBuf, config: CleanupSection) {
    let max_age = Duration::from_secs(config.max_age_seconds);
    let mut ticker = interval(Duration::from_secs(config.interval_seconds));
    info!(
        dir = %media_dir.display(),
        interval_seconds = config.interval_seconds,
        max_age_seconds = config.max_age_seconds,
        "cleanup sweeper started"
    );
    loop {
        ticker.tick().await;
        match sweep(&media_dir, max_age).await {
            Ok(0) => debug!("sweep removed nothing"),
            Ok(removed) => info!(removed, "removed aged media files"),
            Err(err) => warn!(error = %err, "media sweep failed"),
        }
    }
}

/// One pass. Files whose modification time is older than `max_age` are
/// deleted; subdirectories are left alone.
pub async fn sweep(dir: &Path, max_age: Duration) -> io::Result<usize> {
    let mut removed = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to stat media file");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|mtime| mtime.elapsed().ok())
            .unwrap_or_default();
        if age > max_age {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "removed aged media file");
                    removed += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to remove media file")
                }
            }
        }
    }
    Ok(removed)
}
