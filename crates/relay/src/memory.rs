use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::backend::{RelayBackend, RelaySubscription};
use crate::error::RelayError;

const CHANNEL_CAPACITY: usize = 64;

/// Process-local relay backend for tests and single-host setups without a
/// broker. Published payloads are also recorded for inspection.
#[derive(Default)]
pub struct InMemoryRelay {
    presence: RwLock<HashMap<String, String>>,
    notes: RwLock<BTreeMap<String, String>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    published: RwLock<Vec<(String, String)>>,
    unavailable: AtomicBool,
    stalled: AtomicBool,
}

impl InMemoryRelay {
    /// Makes every subsequent call fail as if the broker were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes every subsequent call hang, as with a broker host that never
    /// answers.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Closes every open subscription, as when the broker drops its clients.
    /// Later subscribers get a fresh channel.
    pub async fn disconnect_subscribers(&self) {
        self.channels.lock().await.clear();
    }

    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.lock().await.get(channel).map_or(0, broadcast::Sender::receiver_count)
    }

    pub async fn published(&self) -> Vec<(String, String)> {
        self.published.read().await.clone()
    }

    async fn check_available(&self) -> Result<(), RelayError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RelayError::Backend("broker unavailable".to_owned()));
        }
        Ok(())
    }

    async fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl RelayBackend for InMemoryRelay {
    async fn ping(&self) -> Result<(), RelayError> {
        self.check_available().await
    }

    async fn set_presence(&self, user_id: &str, name: &str) -> Result<(), RelayError> {
        self.check_available().await?;
        self.presence.write().await.insert(user_id.to_owned(), name.to_owned());
        Ok(())
    }

    async fn get_presence(&self, user_id: &str) -> Result<Option<String>, RelayError> {
        self.check_available().await?;
        Ok(self.presence.read().await.get(user_id).cloned())
    }

    async fn delete_presence(&self, user_id: &str) -> Result<(), RelayError> {
        self.check_available().await?;
        self.presence.write().await.remove(user_id);
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), RelayError> {
        self.check_available().await?;
        self.published.write().await.push((channel.to_owned(), payload.to_owned()));
        // No receivers is not an error for a broadcast channel.
        let _ = self.sender(channel).await.send(payload.to_owned());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn RelaySubscription>, RelayError> {
        self.check_available().await.map_err(|error| RelayError::Subscribe {
            channel: channel.to_owned(),
            detail: error.to_string(),
        })?;
        let receiver = self.sender(channel).await.subscribe();
        Ok(Box::new(InMemorySubscription { receiver }))
    }

    async fn insert_note(&self, key: &str, text: &str) -> Result<(), RelayError> {
        self.check_available().await?;
        self.notes.write().await.insert(key.to_owned(), text.to_owned());
        Ok(())
    }

    async fn notes(&self) -> Result<Vec<(String, String)>, RelayError> {
        self.check_available().await?;
        let notes = self.notes.read().await;
        Ok(notes.iter().map(|(key, text)| (key.clone(), text.clone())).collect())
    }

    async fn delete_note(&self, key: &str) -> Result<(), RelayError> {
        self.check_available().await?;
        self.notes.write().await.remove(key);
        Ok(())
    }

    async fn clear_notes(&self) -> Result<(), RelayError> {
        self.check_available().await?;
        self.notes.write().await.clear();
        Ok(())
    }
}

struct InMemorySubscription {
    receiver: broadcast::Receiver<String>,
}

#[async_trait]
impl RelaySubscription for InMemorySubscription {
    async fn next_payload(&mut self) -> Result<String, RelayError> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Ok(payload),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(RelayError::SubscriptionClosed)
                }
            }
        }
    }
}
