//! Call records store
//!
//! The recorder only needs a handful of operations from the call database;
//! they are expressed as a trait so the host can plug in its own storage.

use crate::utils::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A logged inbound call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: i64,
    pub phone_digits: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Public path of the audio chosen for this call
    pub audio_path: Option<String>,
}

/// Entry in the vendor-research recording log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRecording {
    pub call_id: i64,
    pub phone_digits: String,
    pub audio_path: String,
    pub duration_sec: u64,
    pub created_at: DateTime<Utc>,
}

/// Storage operations the recorder depends on
#[async_trait]
pub trait CallStore: Send + Sync {
    /// Log a new call and return it
    async fn create_call(&self, phone_digits: &str) -> AppResult<CallRecord>;

    async fn get_call(&self, call_id: i64) -> AppResult<Option<CallRecord>>;

    /// Set the call's public audio path
    async fn update_call_audio(&self, call_id: i64, audio_path: &str) -> AppResult<()>;

    /// Mark the call as ended now
    async fn update_call_end(&self, call_id: i64) -> AppResult<()>;

    async fn add_research_recording(&self, entry: ResearchRecording) -> AppResult<()>;
}

#[derive(Default)]
struct MemoryInner {
    next_id: i64,
    calls: BTreeMap<i64, CallRecord>,
    research: Vec<ResearchRecording>,
}

impl MemoryInner {
    fn insert(&mut self, call_id: i64, phone_digits: &str) -> CallRecord {
        let record = CallRecord {
            id: call_id,
            phone_digits: phone_digits.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            audio_path: None,
        };
        self.next_id = self.next_id.max(call_id);
        self.calls.insert(call_id, record.clone());
        record
    }
}

/// [`CallStore`] kept in memory for the lifetime of the process
#[derive(Default)]
pub struct MemoryCallStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a call under a caller-chosen id
    pub fn insert_call(&self, call_id: i64, phone_digits: &str) -> CallRecord {
        self.inner.write().insert(call_id, phone_digits)
    }

    pub fn research_recordings(&self) -> Vec<ResearchRecording> {
        self.inner.read().research.clone()
    }

    fn with_call<F>(&self, call_id: i64, update: F) -> AppResult<()>
    where
        F: FnOnce(&mut CallRecord),
    {
        let mut inner = self.inner.write();
        let call = inner
            .calls
            .get_mut(&call_id)
            .ok_or(AppError::CallNotFound(call_id))?;
        update(call);
        Ok(())
    }
}

#[async_trait]
impl CallStore for MemoryCallStore {
    async fn create_call(&self, phone_digits: &str) -> AppResult<CallRecord> {
        let mut inner = self.inner.write();
        let call_id = inner.next_id + 1;
        Ok(inner.insert(call_id, phone_digits))
    }

    async fn get_call(&self, call_id: i64) -> AppResult<Option<CallRecord>> {
        Ok(self.inner.read().calls.get(&call_id).cloned())
    }

    async fn update_call_audio(&self, call_id: i64, audio_path: &str) -> AppResult<()> {
        self.with_call(call_id, |call| call.audio_path = Some(audio_path.to_string()))
    }

    async fn update_call_end(&self, call_id: i64) -> AppResult<()> {
        self.with_call(call_id, |call| call.ended_at = Some(Utc::now()))
    }

    async fn add_research_recording(&self, entry: ResearchRecording) -> AppResult<()> {
        self.inner.write().research.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_update_call() {
        let store = MemoryCallStore::new();
        let call = store.create_call("5551234567").await.unwrap();
        assert_eq!(call.id, 1);

        store
            .update_call_audio(call.id, "/recordings/1/system.wav")
            .await
            .unwrap();
        store.update_call_end(call.id).await.unwrap();

        let stored = store.get_call(call.id).await.unwrap().unwrap();
        assert_eq!(stored.audio_path.as_deref(), Some("/recordings/1/system.wav"));
        assert!(stored.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_ids_continue_after_inserted_call() {
        let store = MemoryCallStore::new();
        store.insert_call(41, "");
        let next = store.create_call("").await.unwrap();
        assert_eq!(next.id, 42);
    }

    #[tokio::test]
    async fn test_updating_unknown_call_fails() {
        let store = MemoryCallStore::new();
        let err = store.update_call_end(3).await.unwrap_err();
        assert!(matches!(err, AppError::CallNotFound(3)));
    }
}
