use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::backend::AnalysisBackend;
use crate::error::HistoryError;
use crate::types::{StoredMessage, SUMMARY_MARKER};

/// Uniform save/load contract over a chat-history store. The remote service
/// and the local cache both implement this, so the fallback policy lives in
/// one place ([`TieredHistory`]) instead of nested error handlers.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save(
        &self,
        user_id: &str,
        document_id: &str,
        messages: &[StoredMessage],
    ) -> Result<(), HistoryError>;

    /// Ok(empty) means "no history" — distinct from Err, which means the
    /// store itself failed.
    async fn load(&self, user_id: &str, document_id: &str)
        -> Result<Vec<StoredMessage>, HistoryError>;

    async fn clear(&self, user_id: &str, document_id: &str) -> Result<(), HistoryError>;
}

/// Primary store: the analysis service's history endpoints.
pub struct RemoteHistory {
    backend: Arc<dyn AnalysisBackend>,
}

impl RemoteHistory {
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl HistoryStore for RemoteHistory {
    async fn save(
        &self,
        user_id: &str,
        document_id: &str,
        messages: &[StoredMessage],
    ) -> Result<(), HistoryError> {
        let receipt = self
            .backend
            .save_history(user_id, document_id, messages)
            .await?;
        debug!(document_id, count = receipt.count, "chat history saved");
        Ok(())
    }

    async fn load(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<Vec<StoredMessage>, HistoryError> {
        Ok(self.backend.load_history(user_id, document_id).await?)
    }

    async fn clear(&self, user_id: &str, document_id: &str) -> Result<(), HistoryError> {
        Ok(self.backend.delete_history(user_id, document_id).await?)
    }
}

/// Drop any entry containing the summary marker phrase. Applied on every
/// read and before every write, so a marker entry in an old stored payload
/// is filtered idempotently no matter which store it came from.
pub fn filter_marker(messages: Vec<StoredMessage>) -> Vec<StoredMessage> {
    messages
        .into_iter()
        .filter(|m| !m.content.contains(SUMMARY_MARKER))
        .collect()
}

/// Remote-first history with silent local fallback.
///
/// Load: primary wins whenever it answers, even with an empty list; the
/// fallback is consulted only when the primary errors. Save: primary, then
/// fallback on error. Neither path ever surfaces to the user.
pub struct TieredHistory {
    primary: Arc<dyn HistoryStore>,
    fallback: Arc<dyn HistoryStore>,
}

impl TieredHistory {
    pub fn new(primary: Arc<dyn HistoryStore>, fallback: Arc<dyn HistoryStore>) -> Self {
        Self { primary, fallback }
    }

    /// Best-effort load. Total failure degrades to an empty history.
    pub async fn load(&self, user_id: &str, document_id: &str) -> Vec<StoredMessage> {
        match self.primary.load(user_id, document_id).await {
            Ok(messages) => filter_marker(messages),
            Err(e) => {
                warn!(document_id, "primary history load failed, trying cache: {e}");
                match self.fallback.load(user_id, document_id).await {
                    Ok(messages) => filter_marker(messages),
                    Err(e) => {
                        warn!(document_id, "fallback history load failed: {e}");
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Persist the filtered subset, degrading to the fallback store on
    /// primary failure.
    pub async fn save(
        &self,
        user_id: &str,
        document_id: &str,
        messages: &[StoredMessage],
    ) -> Result<(), HistoryError> {
        let filtered = filter_marker(messages.to_vec());
        match self.primary.save(user_id, document_id, &filtered).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(document_id, "primary history save failed, caching locally: {e}");
                self.fallback.save(user_id, document_id, &filtered).await
            }
        }
    }

    /// Clear both tiers, best-effort.
    pub async fn clear(&self, user_id: &str, document_id: &str) {
        if let Err(e) = self.primary.clear(user_id, document_id).await {
            warn!(document_id, "primary history clear failed: {e}");
        }
        if let Err(e) = self.fallback.clear(user_id, document_id).await {
            warn!(document_id, "fallback history clear failed: {e}");
        }
    }
}
