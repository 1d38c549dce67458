use async_trait::async_trait;
use futures::stream::{self, BoxStream};

use crate::models::{Entry, NewEntry};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Entry store is not configured")]
    Unavailable,
    #[error("Entry store request failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// One item per change to the persisted collection. Carries no payload;
/// subscribers reload the full collection.
pub type ChangeStream = BoxStream<'static, ()>;

/// Append-only collection of entries with change notification.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Returns once the entry is durably accepted, with its server timestamp.
    async fn append(&self, entry: NewEntry) -> Result<Entry, StoreError>;

    /// Every entry, newest `created_at` first.
    async fn list(&self) -> Result<Vec<Entry>, StoreError>;

    async fn changes(&self) -> Result<ChangeStream, StoreError>;
}

/// Stand-in used when no connection parameters were configured.
pub struct UnavailableStore;

#[async_trait]
impl EntryStore for UnavailableStore {
    async fn append(&self, _entry: NewEntry) -> Result<Entry, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn list(&self) -> Result<Vec<Entry>, StoreError> {
        Ok(Vec::new())
    }

    async fn changes(&self) -> Result<ChangeStream, StoreError> {
        Ok(Box::pin(stream::empty()))
    }
}

#[cfg(test)]
pub use memory::MemoryStore;

#[cfg(test)]
mod memory {
    use std::sync::Mutex;

    use chrono::{Duration, Utc};
    use futures::stream;
    use tokio::sync::broadcast;
    use uuid::Uuid;

    use super::*;

    pub struct MemoryStore {
        entries: Mutex<Vec<Entry>>,
        changes: broadcast::Sender<()>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            let (changes, _) = broadcast::channel(16);
            Self {
                entries: Mutex::new(Vec::new()),
                changes,
            }
        }
    }

    #[async_trait]
    impl EntryStore for MemoryStore {
        async fn append(&self, entry: NewEntry) -> Result<Entry, StoreError> {
            let stored = {
                let mut entries = self.entries.lock().unwrap();
                // Keep timestamps strictly increasing so ordering is deterministic.
                let created_at = entries
                    .iter()
                    .map(|existing| existing.created_at + Duration::microseconds(1))
                    .max()
                    .unwrap_or_else(Utc::now)
                    .max(Utc::now());
                let stored = Entry::from_new(Uuid::new_v4(), entry, created_at);
                entries.push(stored.clone());
                stored
            };
            let _ = self.changes.send(());
            Ok(stored)
        }

        async fn list(&self) -> Result<Vec<Entry>, StoreError> {
            let mut entries = self.entries.lock().unwrap().clone();
            entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(entries)
        }

        async fn changes(&self) -> Result<ChangeStream, StoreError> {
            let receiver = self.changes.subscribe();
            Ok(Box::pin(stream::unfold(receiver, |mut receiver| async move {
                match receiver.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => Some(((), receiver)),
                    Err(broadcast::error::RecvError::Closed) => None,
                }
            })))
        }
    }
}
