use crate::interface::SecretStore;
use crate::store::{PersistedSecretRecord, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-process store with call counters, for orchestrator tests.
#[derive(Default)]
pub struct MemorySecretStore {
    records: Mutex<HashMap<String, PersistedSecretRecord>>,
    pub exists_calls: AtomicUsize,
    pub save_calls: AtomicUsize,
    pub load_calls: AtomicUsize,
    /// Number of upcoming saves that fail with a transient backend error.
    pub failing_saves: AtomicUsize,
    /// Injected save failures still write the record, like a timed out
    /// request the backend had already committed.
    pub commit_failed_saves: AtomicBool,
}

impl MemorySecretStore {
    pub fn with_record(name: &str, record: PersistedSecretRecord) -> Self {
        let store = Self::default();
        store
            .records
            .lock()
            .unwrap()
            .insert(name.to_string(), record);
        store
    }

    pub fn get(&self, name: &str) -> Option<PersistedSecretRecord> {
        self.records.lock().unwrap().get(name).cloned()
    }

    pub fn saves(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.lock().unwrap().contains_key(name))
    }

    async fn save(&self, name: &str, record: &PersistedSecretRecord) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            if self.commit_failed_saves.load(Ordering::SeqCst) {
                self.records
                    .lock()
                    .unwrap()
                    .insert(name.to_string(), record.clone());
            }
            return Err(StoreError::Backend("injected failure".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        if records.contains_key(name) {
            return Err(StoreError::Conflict(name.to_string()));
        }
        records.insert(name.to_string(), record.clone());
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<PersistedSecretRecord, StoreError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}
