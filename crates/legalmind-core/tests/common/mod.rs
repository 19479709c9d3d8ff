#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use legalmind_core::backend::{AnalysisBackend, TokenProvider};
use legalmind_core::config::Config;
use legalmind_core::error::ApiError;
use legalmind_core::types::{
    ChatbotHealth, ChatbotReply, ChatReply, DocumentDetail, DocumentPresence, JobStatus,
    SaveReceipt, StoredMessage, UploadReceipt,
};

/// Config with short timers so polling/debounce tests run in milliseconds.
pub fn test_config() -> Config {
    Config {
        api_base_url: "http://localhost:0".into(),
        access_token: String::new(),
        credentials_path: String::new(),
        user_id: "u-test".into(),
        cache_dir: String::new(),
        poll_interval_ms: 5,
        poll_backoff_ms: 10,
        persist_debounce_ms: 20,
        request_timeout_s: 1,
    }
}

fn not_scripted<T>() -> Result<T, ApiError> {
    Err(ApiError::Transport("not scripted".into()))
}

/// Scriptable analysis backend. Each response slot holds either a canned
/// result or nothing (which surfaces as a transport error), and call
/// recorders let tests assert on what went over the seam.
#[derive(Default)]
pub struct FakeBackend {
    pub upload_response: Mutex<Option<Result<UploadReceipt, ApiError>>>,
    pub upload_calls: AtomicUsize,

    /// Poll script, popped front-first; exhausted = transport error.
    pub job_statuses: Mutex<VecDeque<Result<JobStatus, ApiError>>>,
    pub polls: AtomicUsize,

    pub document_response: Mutex<Option<Result<DocumentDetail, ApiError>>>,
    pub report_response: Mutex<Option<Result<String, ApiError>>>,
    pub suggestions_response: Mutex<Option<Result<Vec<String>, ApiError>>>,

    pub chat_response: Mutex<Option<Result<ChatReply, ApiError>>>,
    pub chat_calls: Mutex<Vec<(String, String, Vec<StoredMessage>)>>,
    pub chatbot_response: Mutex<Option<Result<ChatbotReply, ApiError>>>,
    pub chatbot_calls: Mutex<Vec<(String, Vec<StoredMessage>)>>,

    pub load_history_response: Mutex<Option<Result<Vec<StoredMessage>, ApiError>>>,
    pub save_history_fails: AtomicBool,
    pub saved: Mutex<Vec<Vec<StoredMessage>>>,
}

impl FakeBackend {
    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn saved_payloads(&self) -> Vec<Vec<StoredMessage>> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisBackend for FakeBackend {
    async fn upload(
        &self,
        _file_name: &str,
        _bytes: Vec<u8>,
        _user_id: Option<&str>,
    ) -> Result<UploadReceipt, ApiError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.upload_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(not_scripted)
    }

    async fn job_status(&self, _job_id: &str) -> Result<JobStatus, ApiError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.job_statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(not_scripted)
    }

    async fn documents(&self) -> Result<Vec<DocumentDetail>, ApiError> {
        not_scripted()
    }

    async fn document(&self, _id: &str) -> Result<DocumentDetail, ApiError> {
        self.document_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(not_scripted)
    }

    async fn document_exists(&self, _id: &str) -> Result<DocumentPresence, ApiError> {
        Ok(DocumentPresence { exists: true, message: String::new() })
    }

    async fn report(&self, _id: &str) -> Result<String, ApiError> {
        self.report_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(not_scripted)
    }

    async fn chat(
        &self,
        document_id: &str,
        message: &str,
        history: &[StoredMessage],
    ) -> Result<ChatReply, ApiError> {
        self.chat_calls.lock().unwrap().push((
            document_id.to_string(),
            message.to_string(),
            history.to_vec(),
        ));
        self.chat_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(not_scripted)
    }

    async fn chatbot(
        &self,
        message: &str,
        history: &[StoredMessage],
        _document_id: Option<&str>,
    ) -> Result<ChatbotReply, ApiError> {
        self.chatbot_calls
            .lock()
            .unwrap()
            .push((message.to_string(), history.to_vec()));
        self.chatbot_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(not_scripted)
    }

    async fn chatbot_suggestions(
        &self,
        _document_id: Option<&str>,
    ) -> Result<Vec<String>, ApiError> {
        self.suggestions_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(not_scripted)
    }

    async fn chatbot_health(&self) -> Result<ChatbotHealth, ApiError> {
        not_scripted()
    }

    async fn save_history(
        &self,
        _user_id: &str,
        _document_id: &str,
        messages: &[StoredMessage],
    ) -> Result<SaveReceipt, ApiError> {
        if self.save_history_fails.load(Ordering::SeqCst) {
            return Err(ApiError::Service {
                status: 500,
                message: "history table unavailable".into(),
            });
        }
        self.saved.lock().unwrap().push(messages.to_vec());
        Ok(SaveReceipt { status: "ok".into(), count: messages.len() as u64 })
    }

    async fn load_history(
        &self,
        _user_id: &str,
        _document_id: &str,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        self.load_history_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn delete_history(&self, _user_id: &str, _document_id: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

pub struct FakeAuth {
    pub token: Option<String>,
    pub user: Option<String>,
}

#[async_trait]
impl TokenProvider for FakeAuth {
    async fn access_token(&self) -> Option<String> {
        self.token.clone()
    }

    fn user_id(&self) -> Option<String> {
        self.user.clone()
    }
}

// ── Script helpers ────────────────────────────────────────────────────────

pub fn processing(progress: u8, stage: &str) -> Result<JobStatus, ApiError> {
    Ok(JobStatus {
        job_id: "job-1".into(),
        status: legalmind_core::types::JobState::Processing,
        progress,
        stage: stage.into(),
        result: None,
        error: None,
    })
}

pub fn completed(document_id: &str) -> Result<JobStatus, ApiError> {
    Ok(JobStatus {
        job_id: "job-1".into(),
        status: legalmind_core::types::JobState::Completed,
        progress: 100,
        stage: "complete".into(),
        result: Some(legalmind_core::types::JobResult { document_id: document_id.into() }),
        error: None,
    })
}

pub fn failed(error: &str) -> Result<JobStatus, ApiError> {
    Ok(JobStatus {
        job_id: "job-1".into(),
        status: legalmind_core::types::JobState::Failed,
        progress: 0,
        stage: String::new(),
        result: None,
        error: Some(error.into()),
    })
}

pub fn transport_error() -> Result<JobStatus, ApiError> {
    Err(ApiError::Transport("connection refused".into()))
}
