use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{
    ChatbotHealth, ChatbotReply, ChatReply, DocumentDetail, DocumentPresence, JobStatus,
    SaveReceipt, StoredMessage, UploadReceipt,
};

/// The opaque analysis service. All hard computation (PDF ingestion, clause
/// classification, chat) lives behind this seam; the core flows and their
/// tests only ever see this trait.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        user_id: Option<&str>,
    ) -> Result<UploadReceipt, ApiError>;

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, ApiError>;

    async fn documents(&self) -> Result<Vec<DocumentDetail>, ApiError>;

    async fn document(&self, id: &str) -> Result<DocumentDetail, ApiError>;

    async fn document_exists(&self, id: &str) -> Result<DocumentPresence, ApiError>;

    async fn report(&self, id: &str) -> Result<String, ApiError>;

    /// Document-scoped chat turn.
    async fn chat(
        &self,
        document_id: &str,
        message: &str,
        history: &[StoredMessage],
    ) -> Result<ChatReply, ApiError>;

    /// General chatbot turn (optionally document-aware).
    async fn chatbot(
        &self,
        message: &str,
        history: &[StoredMessage],
        document_id: Option<&str>,
    ) -> Result<ChatbotReply, ApiError>;

    async fn chatbot_suggestions(&self, document_id: Option<&str>)
        -> Result<Vec<String>, ApiError>;

    async fn chatbot_health(&self) -> Result<ChatbotHealth, ApiError>;

    async fn save_history(
        &self,
        user_id: &str,
        document_id: &str,
        messages: &[StoredMessage],
    ) -> Result<SaveReceipt, ApiError>;

    async fn load_history(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<Vec<StoredMessage>, ApiError>;

    async fn delete_history(&self, user_id: &str, document_id: &str) -> Result<(), ApiError>;
}

/// The opaque auth provider: whatever session currently exists, reduced to
/// the two things this client needs from it.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current bearer token, if a session exists.
    async fn access_token(&self) -> Option<String>;

    /// Stable user id for history keys and upload attribution.
    fn user_id(&self) -> Option<String>;
}
