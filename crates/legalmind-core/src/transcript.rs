use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::AnalysisBackend;
use crate::config::Config;
use crate::error::ApiError;
use crate::history::TieredHistory;
use crate::types::{risk_tier, ChatMessage, DocumentDetail, Role, StoredMessage, SUMMARY_MARKER};

/// Questions offered when the suggestions endpoint is unavailable.
pub const DEFAULT_QUESTIONS: [&str; 4] = [
    "What are the key obligations in this contract?",
    "Which clauses carry the most risk?",
    "Are there termination or auto-renewal clauses I should know about?",
    "What payment terms does the contract specify?",
];

/// The synthetic contract summary. Starts with [`SUMMARY_MARKER`] so history
/// filtering can recognize it wherever it ends up.
fn summary_text(detail: &DocumentDetail) -> String {
    format!(
        "{marker} \"{file}\". {risky} of {total} clauses look potentially risky, \
         which puts the overall risk in the {tier} tier. Ask me anything about the document.",
        marker = SUMMARY_MARKER,
        file = detail.file_name,
        risky = detail.risky_chunks,
        total = detail.total_chunks,
        tier = risk_tier(detail.risk_score),
    )
}

/// Deduplicate by role plus the first 100 characters of content; first
/// occurrence wins, insertion order preserved.
pub fn dedup_messages(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut seen = HashSet::new();
    messages
        .into_iter()
        .filter(|m| seen.insert(m.dedup_key()))
        .collect()
}

/// Chat transcript manager for one session.
///
/// Document-scoped sessions bootstrap two synthetic messages (the raw
/// report, then a templated summary) ahead of any persisted history;
/// general sessions carry only real turns. Persistence is debounced,
/// fire-and-forget, and remote-first with a local-cache fallback.
pub struct ChatSession {
    backend: Arc<dyn AnalysisBackend>,
    history: Arc<TieredHistory>,
    user_id: String,
    document_id: Option<String>,
    /// Arc-wrapped so the debounced persist task can hold it past `&self`.
    messages: Arc<Mutex<Vec<ChatMessage>>>,
    suggestions: Mutex<Vec<String>>,
    loading_initial: AtomicBool,
    sending: AtomicBool,
    /// Bumped on every transcript change; a debounced persist only fires if
    /// it is still the latest.
    persist_gen: Arc<AtomicU64>,
    next_msg: AtomicU64,
    debounce: Duration,
    cancel: CancellationToken,
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        history: Arc<TieredHistory>,
        user_id: impl Into<String>,
        document_id: Option<String>,
        config: &Config,
    ) -> Self {
        Self {
            backend,
            history,
            user_id: user_id.into(),
            document_id,
            messages: Arc::new(Mutex::new(Vec::new())),
            suggestions: Mutex::new(Vec::new()),
            loading_initial: AtomicBool::new(true),
            sending: AtomicBool::new(false),
            persist_gen: Arc::new(AtomicU64::new(0)),
            next_msg: AtomicU64::new(1),
            debounce: Duration::from_millis(config.persist_debounce_ms),
            cancel: CancellationToken::new(),
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading_initial.load(Ordering::SeqCst)
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::SeqCst)
    }

    pub async fn suggestions(&self) -> Vec<String> {
        self.suggestions.lock().await.clone()
    }

    /// Deduplicated transcript for display.
    pub async fn transcript(&self) -> Vec<ChatMessage> {
        dedup_messages(self.messages.lock().await.clone())
    }

    /// Tear down the session. Pending persists and in-flight sends observe
    /// this before their next state mutation.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Initial load. Document-scoped: fetch detail, report, and suggested
    /// questions concurrently — all three or nothing; any failure aborts
    /// with no partial synthetic messages. Then layer persisted history
    /// (remote-first, cache fallback) after the synthetic pair. Without a
    /// document: generic suggestions only, hard-coded fallback.
    pub async fn bootstrap(&self) -> Result<(), ApiError> {
        match self.document_id.clone() {
            Some(doc_id) => {
                let (detail, report, suggestions) = tokio::try_join!(
                    self.backend.document(&doc_id),
                    self.backend.report(&doc_id),
                    self.backend.chatbot_suggestions(Some(&doc_id)),
                )?;

                if self.cancel.is_cancelled() {
                    return Ok(());
                }

                let mut msgs = vec![
                    self.make_message(Role::Assistant, report, true),
                    self.make_message(Role::Assistant, summary_text(&detail), false),
                ];

                let stored = self.history.load(&self.user_id, &doc_id).await;
                for m in stored {
                    msgs.push(self.make_message(m.role, m.content, false));
                }

                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                *self.messages.lock().await = msgs;
                *self.suggestions.lock().await = suggestions;
            }
            None => {
                let suggestions = match self.backend.chatbot_suggestions(None).await {
                    Ok(s) if !s.is_empty() => s,
                    Ok(_) | Err(_) => DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect(),
                };
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                *self.suggestions.lock().await = suggestions;
            }
        }
        self.loading_initial.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Submit one user turn. No-op on blank input or while another send is
    /// in flight. The user message is appended optimistically and stays in
    /// the transcript even when the service errors.
    pub async fn send_message(&self, text: &str) -> Result<Option<ChatMessage>, ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if self.sending.swap(true, Ordering::SeqCst) {
            debug!("send already in flight, ignoring");
            return Ok(None);
        }
        let result = self.send_inner(text).await;
        self.sending.store(false, Ordering::SeqCst);
        result
    }

    async fn send_inner(&self, text: &str) -> Result<Option<ChatMessage>, ApiError> {
        let prior = self.messages.lock().await.clone();
        let user_msg = self.make_message(Role::User, text.to_string(), false);
        self.append(user_msg.clone()).await;
        self.schedule_persist();

        let (response, timestamp) = match &self.document_id {
            Some(doc_id) => {
                // Full non-report transcript, new user turn included.
                let mut history: Vec<StoredMessage> = prior
                    .iter()
                    .filter(|m| !m.is_report)
                    .map(StoredMessage::from)
                    .collect();
                history.push(StoredMessage::from(&user_msg));
                let reply = self.backend.chat(doc_id, text, &history).await?;
                (reply.response, reply.timestamp)
            }
            None => {
                // Prior real turns only; general sessions have no synthetic
                // messages to exclude.
                let history: Vec<StoredMessage> =
                    prior.iter().map(StoredMessage::from).collect();
                let reply = self.backend.chatbot(text, &history, None).await?;
                if !self.cancel.is_cancelled() {
                    if let Some(s) = reply.suggestions.filter(|s| !s.is_empty()) {
                        *self.suggestions.lock().await = s;
                    }
                }
                (reply.response, reply.timestamp)
            }
        };

        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        let assistant = ChatMessage {
            id: self.next_id(),
            role: Role::Assistant,
            content: response,
            timestamp: timestamp.unwrap_or_else(Utc::now),
            is_report: false,
        };
        self.append(assistant.clone()).await;
        self.schedule_persist();
        Ok(Some(assistant))
    }

    /// Drop persisted history in both tiers and reset the transcript to the
    /// synthetic pair.
    pub async fn clear_history(&self) {
        let Some(doc_id) = &self.document_id else {
            return;
        };
        self.history.clear(&self.user_id, doc_id).await;
        let mut messages = self.messages.lock().await;
        let next: Vec<ChatMessage> = messages
            .iter()
            .filter(|m| m.is_report || m.content.contains(SUMMARY_MARKER))
            .cloned()
            .collect();
        *messages = next;
    }

    /// Debounced fire-and-forget persistence of the non-report,
    /// non-summary subset. Latest change wins; the cancellation token is
    /// checked before the write.
    fn schedule_persist(&self) {
        let Some(document_id) = self.document_id.clone() else {
            return;
        };
        let gen = self.persist_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let persist_gen = Arc::clone(&self.persist_gen);
        let messages = Arc::clone(&self.messages);
        let history = Arc::clone(&self.history);
        let cancel = self.cancel.clone();
        let user_id = self.user_id.clone();
        let debounce = self.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }
            if persist_gen.load(Ordering::SeqCst) != gen {
                // A newer change re-armed the debounce.
                return;
            }
            if cancel.is_cancelled() {
                return;
            }
            let snapshot = messages.lock().await.clone();
            if snapshot.len() <= 2 {
                // Nothing beyond the synthetic pair yet.
                return;
            }
            let payload: Vec<StoredMessage> = snapshot
                .iter()
                .filter(|m| !m.is_report && !m.content.contains(SUMMARY_MARKER))
                .map(StoredMessage::from)
                .collect();
            if let Err(e) = history.save(&user_id, &document_id, &payload).await {
                warn!(%document_id, "chat history persist failed: {e}");
            }
        });
    }

    async fn append(&self, message: ChatMessage) {
        let mut messages = self.messages.lock().await;
        let mut next = messages.clone();
        next.push(message);
        *messages = next;
    }

    fn next_id(&self) -> String {
        format!("msg-{}", self.next_msg.fetch_add(1, Ordering::Relaxed))
    }

    fn make_message(&self, role: Role, content: String, is_report: bool) -> ChatMessage {
        ChatMessage {
            id: self.next_id(),
            role,
            content,
            timestamp: Utc::now(),
            is_report,
        }
    }
}
