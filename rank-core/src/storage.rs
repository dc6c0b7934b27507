use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::feed::Post;
use crate::ranking::Snapshot;

/// What may be found on disk: a full snapshot, or the bare post list older
/// dumps contained (timestamped by the file's mtime).
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSnapshot {
    Full(Snapshot),
    Posts(Vec<Post>),
}

/// Durable home of the latest snapshot: one JSON file, replaced wholesale.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: Option<PathBuf>,
}

impl SnapshotStore {
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads the stored snapshot. Missing or unreadable data yields an empty snapshot.
    pub async fn load(&self) -> Snapshot {
        let Some(path) = &self.path else {
            return Snapshot::empty();
        };

        match read_snapshot(path).await {
            Some(snapshot) => {
                info!(path = %path.display(), posts = snapshot.len(), "loaded cached snapshot");
                snapshot
            }
            None => {
                let tmp = tmp_path(path);
                match read_snapshot(&tmp).await {
                    Some(snapshot) => {
                        warn!(path = %tmp.display(), "recovered snapshot from temp file");
                        snapshot
                    }
                    None => Snapshot::empty(),
                }
            }
        }
    }

    /// Writes to a temp sibling, then renames over the real file.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            debug!("snapshot store is in-memory only; skipping persist");
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = tmp_path(path);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), posts = snapshot.len(), "snapshot persisted");
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

async fn read_snapshot(path: &Path) -> Option<Snapshot> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice::<StoredSnapshot>(&bytes) {
        Ok(StoredSnapshot::Full(snapshot)) => Some(snapshot),
        Ok(StoredSnapshot::Posts(posts)) => {
            let scraped_at = tokio::fs::metadata(path)
                .await
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            Some(Snapshot { scraped_at, posts })
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "failed to parse snapshot JSON");
            None
        }
    }
}
