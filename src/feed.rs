use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::Entry;
use crate::store::EntryStore;

/// Full view of the persisted collection at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub entries: Arc<[Entry]>,
    pub loaded: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
            loaded: false,
        }
    }
}

/// Live subscription to the entry store. Every change replaces the snapshot
/// wholesale. Dropping the subscription stops the feed.
pub struct Subscription {
    receiver: watch::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn current(&self) -> Snapshot {
        self.receiver.borrow().clone()
    }

    /// Waits for the next snapshot. Returns `None` once the feed has ended
    /// and no newer snapshot is pending.
    pub async fn next(&mut self) -> Option<Snapshot> {
        match self.receiver.changed().await {
            Ok(()) => Some(self.receiver.borrow_and_update().clone()),
            Err(_) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn subscribe(store: Arc<dyn EntryStore>) -> Subscription {
    let (sender, receiver) = watch::channel(Snapshot::default());
    let task = tokio::spawn(run_feed(store, sender));
    Subscription { receiver, task }
}

async fn run_feed(store: Arc<dyn EntryStore>, sender: watch::Sender<Snapshot>) {
    // Listen before the first load so no change between the two is lost.
    let changes = match store.changes().await {
        Ok(changes) => Some(changes),
        Err(err) => {
            tracing::error!("Could not subscribe to entry changes: {}", err);
            None
        }
    };

    refresh(store.as_ref(), &sender).await;

    let Some(mut changes) = changes else {
        return;
    };

    while changes.next().await.is_some() {
        refresh(store.as_ref(), &sender).await;
    }

    tracing::debug!("Entry change feed ended");
}

async fn refresh(store: &dyn EntryStore, sender: &watch::Sender<Snapshot>) {
    match store.list().await {
        Ok(entries) => {
            tracing::debug!(count = entries.len(), "Loaded entry snapshot");
            sender.send_replace(Snapshot {
                entries: entries.into(),
                loaded: true,
            });
        }
        Err(err) => {
            tracing::error!("Failed to load entries: {}", err);
        }
    }
}
