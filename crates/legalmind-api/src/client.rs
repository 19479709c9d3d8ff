use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use legalmind_core::backend::{AnalysisBackend, TokenProvider};
use legalmind_core::config::Config;
use legalmind_core::error::ApiError;
use legalmind_core::types::{
    ChatbotHealth, ChatbotReply, ChatReply, DocumentDetail, DocumentPresence, JobStatus,
    SaveReceipt, StoredMessage, UploadReceipt,
};

/// Reqwest-backed [`AnalysisBackend`] for the analysis service's JSON API.
/// Every request carries a bearer token when the auth provider has one.
pub struct AnalysisClient {
    base_url: String,
    http: Client,
    auth: Arc<dyn TokenProvider>,
}

// ── Wire bodies ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    document_id: &'a str,
    message: &'a str,
    chat_history: &'a [StoredMessage],
}

#[derive(Serialize)]
struct ChatbotRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_history: Option<&'a [StoredMessage]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_id: Option<&'a str>,
}

#[derive(Serialize)]
struct SaveHistoryRequest<'a> {
    user_id: &'a str,
    document_id: &'a str,
    messages: &'a [StoredMessage],
}

#[derive(Deserialize)]
struct DocumentsResponse {
    documents: Vec<DocumentDetail>,
}

#[derive(Deserialize)]
struct ReportResponse {
    report: String,
}

#[derive(Deserialize)]
struct SuggestionsResponse {
    suggestions: Vec<String>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<StoredMessage>,
}

// ── Response handling ────────────────────────────────────────────────────

/// Extract the service's own message from a non-2xx body when it has one.
fn service_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message", "detail"].iter().find_map(|key| {
                v.get(key)
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("analysis service returned {status}"));
    ApiError::Service {
        status: status.as_u16(),
        message,
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        warn!(%status, "analysis service error: {body}");
        return Err(service_error(status, &body));
    }
    resp.json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

impl AnalysisClient {
    pub fn new(config: &Config, auth: Arc<dyn TokenProvider>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_s))
            .build()?;
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            http,
            auth,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authed(&self, rb: RequestBuilder) -> RequestBuilder {
        match self.auth.access_token().await {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<T, ApiError> {
        let rb = self.authed(rb).await;
        let resp = rb.send().await.map_err(ApiError::transport)?;
        read_json(resp).await
    }
}

#[async_trait]
impl AnalysisBackend for AnalysisClient {
    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        user_id: Option<&str>,
    ) -> Result<UploadReceipt, ApiError> {
        debug!(file_name, size = bytes.len(), "uploading contract");
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(ApiError::transport)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let mut rb = self.http.post(self.url("/upload")).multipart(form);
        if let Some(uid) = user_id {
            rb = rb.header("X-User-Id", uid);
        }
        self.send_json(rb).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        self.send_json(self.http.get(self.url(&format!("/job/{job_id}"))))
            .await
    }

    async fn documents(&self) -> Result<Vec<DocumentDetail>, ApiError> {
        let resp: DocumentsResponse = self.send_json(self.http.get(self.url("/documents"))).await?;
        Ok(resp.documents)
    }

    async fn document(&self, id: &str) -> Result<DocumentDetail, ApiError> {
        self.send_json(self.http.get(self.url(&format!("/document/{id}"))))
            .await
    }

    async fn document_exists(&self, id: &str) -> Result<DocumentPresence, ApiError> {
        self.send_json(self.http.get(self.url(&format!("/document-exists/{id}"))))
            .await
    }

    async fn report(&self, id: &str) -> Result<String, ApiError> {
        let resp: ReportResponse = self
            .send_json(self.http.get(self.url(&format!("/report/{id}"))))
            .await?;
        Ok(resp.report)
    }

    async fn chat(
        &self,
        document_id: &str,
        message: &str,
        history: &[StoredMessage],
    ) -> Result<ChatReply, ApiError> {
        debug!(document_id, history_len = history.len(), "document chat turn");
        let body = ChatRequest {
            document_id,
            message,
            chat_history: history,
        };
        self.send_json(self.http.post(self.url("/chat")).json(&body))
            .await
    }

    async fn chatbot(
        &self,
        message: &str,
        history: &[StoredMessage],
        document_id: Option<&str>,
    ) -> Result<ChatbotReply, ApiError> {
        let body = ChatbotRequest {
            message,
            chat_history: (!history.is_empty()).then_some(history),
            document_id,
        };
        self.send_json(self.http.post(self.url("/chatbot")).json(&body))
            .await
    }

    async fn chatbot_suggestions(
        &self,
        document_id: Option<&str>,
    ) -> Result<Vec<String>, ApiError> {
        let mut rb = self.http.get(self.url("/chatbot/suggestions"));
        if let Some(id) = document_id {
            rb = rb.query(&[("document_id", id)]);
        }
        let resp: SuggestionsResponse = self.send_json(rb).await?;
        Ok(resp.suggestions)
    }

    async fn chatbot_health(&self) -> Result<ChatbotHealth, ApiError> {
        self.send_json(self.http.get(self.url("/chatbot/health")))
            .await
    }

    async fn save_history(
        &self,
        user_id: &str,
        document_id: &str,
        messages: &[StoredMessage],
    ) -> Result<SaveReceipt, ApiError> {
        let body = SaveHistoryRequest {
            user_id,
            document_id,
            messages,
        };
        self.send_json(self.http.post(self.url("/chat/history/save")).json(&body))
            .await
    }

    async fn load_history(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        let resp: HistoryResponse = self
            .send_json(
                self.http
                    .get(self.url(&format!("/chat/history/{user_id}/{document_id}"))),
            )
            .await?;
        Ok(resp.messages)
    }

    async fn delete_history(&self, user_id: &str, document_id: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .send_json(
                self.http
                    .delete(self.url(&format!("/chat/history/{user_id}/{document_id}"))),
            )
            .await?;
        Ok(())
    }
}
