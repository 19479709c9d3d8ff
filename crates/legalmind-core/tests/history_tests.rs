use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use legalmind_core::error::HistoryError;
use legalmind_core::history::{HistoryStore, TieredHistory};
use legalmind_core::types::{Role, StoredMessage, SUMMARY_MARKER};

fn msg(content: &str) -> StoredMessage {
    StoredMessage { role: Role::User, content: content.to_string() }
}

/// In-memory store with per-operation failure switches and call counters.
#[derive(Default)]
struct MemStore {
    data: Mutex<Vec<StoredMessage>>,
    fail_load: bool,
    fail_save: bool,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemStore {
    fn with(messages: Vec<StoredMessage>) -> Self {
        Self { data: Mutex::new(messages), ..Default::default() }
    }

    fn failing_load() -> Self {
        Self { fail_load: true, ..Default::default() }
    }
}

#[async_trait]
impl HistoryStore for MemStore {
    async fn save(
        &self,
        _user_id: &str,
        _document_id: &str,
        messages: &[StoredMessage],
    ) -> Result<(), HistoryError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_save {
            return Err(HistoryError::Store("save disabled".into()));
        }
        *self.data.lock().unwrap() = messages.to_vec();
        Ok(())
    }

    async fn load(
        &self,
        _user_id: &str,
        _document_id: &str,
    ) -> Result<Vec<StoredMessage>, HistoryError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(HistoryError::Store("load disabled".into()));
        }
        Ok(self.data.lock().unwrap().clone())
    }

    async fn clear(&self, _user_id: &str, _document_id: &str) -> Result<(), HistoryError> {
        self.data.lock().unwrap().clear();
        Ok(())
    }
}

#[tokio::test]
async fn load_prefers_primary_when_it_answers() {
    let primary = Arc::new(MemStore::with(vec![msg("from primary")]));
    let fallback = Arc::new(MemStore::with(vec![msg("from fallback")]));
    let tiered = TieredHistory::new(primary.clone(), fallback.clone());

    let got = tiered.load("u", "d").await;
    assert_eq!(got, vec![msg("from primary")]);
    assert_eq!(fallback.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn load_empty_primary_is_final() {
    let primary = Arc::new(MemStore::default());
    let fallback = Arc::new(MemStore::with(vec![msg("stale")]));
    let tiered = TieredHistory::new(primary, fallback.clone());

    assert!(tiered.load("u", "d").await.is_empty());
    assert_eq!(fallback.loads.load(Ordering::SeqCst), 0, "empty is not an error");
}

#[tokio::test]
async fn load_falls_back_only_on_primary_error() {
    let primary = Arc::new(MemStore::failing_load());
    let fallback = Arc::new(MemStore::with(vec![msg("from fallback")]));
    let tiered = TieredHistory::new(primary, fallback);

    assert_eq!(tiered.load("u", "d").await, vec![msg("from fallback")]);
}

#[tokio::test]
async fn load_degrades_to_empty_when_both_tiers_fail() {
    let primary = Arc::new(MemStore::failing_load());
    let fallback = Arc::new(MemStore::failing_load());
    let tiered = TieredHistory::new(primary, fallback);

    assert!(tiered.load("u", "d").await.is_empty());
}

#[tokio::test]
async fn marker_entries_are_filtered_from_every_tier() {
    let summary = format!("{SUMMARY_MARKER} \"a.pdf\". 1 of 3 clauses …");
    let primary = Arc::new(MemStore::failing_load());
    let fallback = Arc::new(MemStore::with(vec![msg(&summary), msg("keep me")]));
    let tiered = TieredHistory::new(primary, fallback);

    let got = tiered.load("u", "d").await;
    assert_eq!(got, vec![msg("keep me")]);
}

#[tokio::test]
async fn save_writes_fallback_only_when_primary_fails() {
    let primary = Arc::new(MemStore::default());
    let fallback = Arc::new(MemStore::default());
    let tiered = TieredHistory::new(primary.clone(), fallback.clone());

    tiered.save("u", "d", &[msg("hello")]).await.unwrap();
    assert_eq!(primary.saves.load(Ordering::SeqCst), 1);
    assert_eq!(fallback.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn save_filters_marker_before_either_tier() {
    let summary = format!("{SUMMARY_MARKER} \"a.pdf\". 2 of 9 clauses …");
    let primary = Arc::new(MemStore::default());
    let tiered = TieredHistory::new(primary.clone(), Arc::new(MemStore::default()));

    tiered
        .save("u", "d", &[msg(&summary), msg("real turn")])
        .await
        .unwrap();
    assert_eq!(primary.data.lock().unwrap().clone(), vec![msg("real turn")]);
}

#[tokio::test]
async fn save_degrades_to_fallback_on_primary_error() {
    let primary = Arc::new(MemStore { fail_save: true, ..Default::default() });
    let fallback = Arc::new(MemStore::default());
    let tiered = TieredHistory::new(primary, fallback.clone());

    tiered.save("u", "d", &[msg("cached instead")]).await.unwrap();
    assert_eq!(
        fallback.data.lock().unwrap().clone(),
        vec![msg("cached instead")]
    );
}
