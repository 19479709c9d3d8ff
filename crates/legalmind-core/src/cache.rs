use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::HistoryError;
use crate::history::HistoryStore;
use crate::types::StoredMessage;

/// Local fallback cache: one JSON file per document id under the cache
/// directory. Holds the last-known non-report history when the remote
/// store is unreachable.
pub struct LocalHistoryCache {
    dir: PathBuf,
}

impl LocalHistoryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, document_id: &str) -> PathBuf {
        self.dir.join(format!("chat-{}.json", sanitize(document_id)))
    }
}

/// Document ids come from the service, but they end up in file names —
/// collapse anything outside [A-Za-z0-9._-] to '_'.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Write content to `path` via a temp file in the same directory, then
/// rename, so a crash mid-write never leaves a truncated cache file.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), HistoryError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl HistoryStore for LocalHistoryCache {
    async fn save(
        &self,
        _user_id: &str,
        document_id: &str,
        messages: &[StoredMessage],
    ) -> Result<(), HistoryError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let payload = serde_json::to_string(messages)?;
        write_atomic(&self.path_for(document_id), &payload).await
    }

    async fn load(
        &self,
        _user_id: &str,
        document_id: &str,
    ) -> Result<Vec<StoredMessage>, HistoryError> {
        let path = self.path_for(document_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            // Cache miss is "no history", not a store failure.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    async fn clear(&self, _user_id: &str, document_id: &str) -> Result<(), HistoryError> {
        match tokio::fs::remove_file(self.path_for(document_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
