use async_trait::async_trait;

use crate::error::RelayError;

/// Broker primitives the relay store is built on. Each call maps onto one
/// atomic broker operation so concurrent callers never need extra locking.
#[async_trait]
pub trait RelayBackend: Send + Sync {
    /// Round trip to the broker without touching any key.
    async fn ping(&self) -> Result<(), RelayError>;

    async fn set_presence(&self, user_id: &str, name: &str) -> Result<(), RelayError>;
    async fn get_presence(&self, user_id: &str) -> Result<Option<String>, RelayError>;
    async fn delete_presence(&self, user_id: &str) -> Result<(), RelayError>;

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), RelayError>;
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn RelaySubscription>, RelayError>;

    async fn insert_note(&self, key: &str, text: &str) -> Result<(), RelayError>;
    /// All notes as `(key, text)` pairs in key order.
    async fn notes(&self) -> Result<Vec<(String, String)>, RelayError>;
    async fn delete_note(&self, key: &str) -> Result<(), RelayError>;
    async fn clear_notes(&self) -> Result<(), RelayError>;
}

#[async_trait]
pub trait RelaySubscription: Send {
    /// Waits for the next raw payload published on the subscribed channel.
    async fn next_payload(&mut self) -> Result<String, RelayError>;
}

pub(crate) fn presence_key(user_id: &str) -> String {
    format!("viber-user-id:{user_id}")
}

pub(crate) const NOTES_KEY: &str = "viber-notes";
