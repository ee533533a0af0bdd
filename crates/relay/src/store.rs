use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cmdbot_core::config::AppConfig;
use cmdbot_core::envelope::RelayEnvelope;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::backend::{RelayBackend, RelaySubscription};
use crate::error::RelayError;
use crate::redis_backend::RedisRelay;

pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound for a single broker call other than receiving.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);
pub const UNKNOWN_USER_NAME: &str = "<unknown>";

/// Presence, notes and broadcast for the bot. Holds no backend when the relay
/// channel is not configured, in which case every call is a no-op.
pub struct Relay {
    enabled: Option<EnabledRelay>,
    bot_name: String,
}

struct EnabledRelay {
    backend: Arc<dyn RelayBackend>,
    channel: String,
    subscription: Mutex<Option<Box<dyn RelaySubscription>>>,
    last_note_key: AtomicU64,
    operation_timeout: Duration,
}

impl Relay {
    pub fn disabled(bot_name: impl Into<String>) -> Self {
        Self { enabled: None, bot_name: bot_name.into() }
    }

    pub fn new(
        backend: Arc<dyn RelayBackend>,
        channel: impl Into<String>,
        bot_name: impl Into<String>,
    ) -> Self {
        Self {
            enabled: Some(EnabledRelay {
                backend,
                channel: channel.into(),
                subscription: Mutex::new(None),
                last_note_key: AtomicU64::new(0),
                operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            }),
            bot_name: bot_name.into(),
        }
    }

    /// Bounds every broker call so an unreachable broker fails instead of
    /// hanging the caller.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        if let Some(enabled) = self.enabled.as_mut() {
            enabled.operation_timeout = timeout;
        }
        self
    }

    /// Builds a Redis-backed relay when a channel is configured. No connection
    /// is made until the first operation.
    pub fn from_config(config: &AppConfig) -> Result<Self, RelayError> {
        let Some(channel) = config.relay.channel.as_deref() else {
            return Ok(Self::disabled(config.viber.name.clone()));
        };

        let backend = RedisRelay::open(&config.relay.url)?;
        Ok(Self::new(Arc::new(backend), channel, config.viber.name.clone()))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.is_some()
    }

    pub fn channel(&self) -> Option<&str> {
        self.enabled.as_ref().map(|enabled| enabled.channel.as_str())
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub async fn subscribe_user(&self, user_id: &str, name: &str) {
        if self.enabled.is_none() {
            return;
        }
        self.refresh_user(user_id, name).await;
        let text = format!("Subscribe \"{name}\": {user_id}");
        self.publish(RelayEnvelope::text(user_id, text, name)).await;
    }

    pub async fn conversation_started(&self, user_id: &str, name: &str) {
        if self.enabled.is_none() {
            return;
        }
        self.refresh_user(user_id, name).await;
        let text = format!("Conversation started: {user_id}");
        self.publish(RelayEnvelope::text(user_id, text, name)).await;
    }

    pub async fn refresh_user(&self, user_id: &str, name: &str) {
        let Some(enabled) = &self.enabled else {
            return;
        };
        let stored = enabled.bounded("set_presence", enabled.backend.set_presence(user_id, name));
        if let Err(error) = stored.await {
            warn!(
                event_name = "relay.presence_failed",
                user_id = %user_id,
                error = %error,
                "could not store user presence"
            );
        }
    }

    /// Removes the presence record and announces it with the last known name.
    /// A user that was never seen is announced as `<unknown>`.
    pub async fn unsubscribe_user(&self, user_id: &str) {
        let Some(enabled) = &self.enabled else {
            return;
        };

        let lookup = enabled.bounded("get_presence", enabled.backend.get_presence(user_id));
        let name = match lookup.await {
            Ok(name) => name,
            Err(error) => {
                warn!(
                    event_name = "relay.presence_failed",
                    user_id = %user_id,
                    error = %error,
                    "could not read user presence"
                );
                None
            }
        }
        .unwrap_or_else(|| UNKNOWN_USER_NAME.to_owned());

        let deleted = enabled.bounded("delete_presence", enabled.backend.delete_presence(user_id));
        if let Err(error) = deleted.await {
            warn!(
                event_name = "relay.presence_failed",
                user_id = %user_id,
                error = %error,
                "could not delete user presence"
            );
        }

        let text = format!("Un-subscribe \"{name}\": {user_id}");
        self.publish(RelayEnvelope::text(user_id, text, name)).await;
    }

    /// Broadcasts `envelope` on the relay channel. An empty name is replaced
    /// with the bot name. Broker failures are logged and dropped.
    pub async fn publish(&self, mut envelope: RelayEnvelope) {
        let Some(enabled) = &self.enabled else {
            return;
        };
        if envelope.name.is_empty() {
            envelope.name = self.bot_name.clone();
        }

        let result = match envelope.encode() {
            Ok(payload) => {
                let sent = enabled.backend.publish(&enabled.channel, &payload);
                enabled.bounded("publish", sent).await
            }
            Err(error) => Err(RelayError::from(error)),
        };
        match result {
            Ok(()) => debug!(
                event_name = "relay.published",
                channel = %enabled.channel,
                user_id = %envelope.user_id,
                kind = ?envelope.kind,
                "published relay envelope"
            ),
            Err(error) => warn!(
                event_name = "relay.publish_failed",
                channel = %enabled.channel,
                user_id = %envelope.user_id,
                error = %error,
                "could not publish relay envelope"
            ),
        }
    }

    /// Checks that the broker answers. `Disabled` when no relay is configured.
    pub async fn ping(&self) -> Result<(), RelayError> {
        let enabled = self.enabled.as_ref().ok_or(RelayError::Disabled)?;
        enabled.bounded("ping", enabled.backend.ping()).await
    }

    /// Subscribes this process to the relay channel. Calling it again while
    /// subscribed does nothing.
    pub async fn listen(&self) -> Result<(), RelayError> {
        let enabled = self.enabled.as_ref().ok_or(RelayError::Disabled)?;

        let mut subscription = enabled.subscription.lock().await;
        if subscription.is_none() {
            let subscribe = enabled.backend.subscribe(&enabled.channel);
            *subscription = Some(enabled.bounded("subscribe", subscribe).await?);
        }
        Ok(())
    }

    /// Waits up to `timeout` for the next envelope. Returns `None` on timeout,
    /// when disabled, or when the payload cannot be decoded. A transport
    /// failure drops the subscription so that `listen` can establish a new one.
    pub async fn get_message(
        &self,
        timeout: Duration,
    ) -> Result<Option<RelayEnvelope>, RelayError> {
        let Some(enabled) = &self.enabled else {
            return Ok(None);
        };

        let mut guard = enabled.subscription.lock().await;
        let subscription = guard.as_mut().ok_or(RelayError::NotListening)?;

        let payload = match tokio::time::timeout(timeout, subscription.next_payload()).await {
            Err(_elapsed) => return Ok(None),
            Ok(Err(error)) => {
                *guard = None;
                return Err(error);
            }
            Ok(Ok(payload)) => payload,
        };

        match RelayEnvelope::decode(&payload) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(error) => {
                warn!(
                    event_name = "relay.envelope_undecodable",
                    channel = %enabled.channel,
                    error = %error,
                    "skipping undecodable relay payload"
                );
                Ok(None)
            }
        }
    }

    pub async fn add_note(&self, text: &str) {
        let Some(enabled) = &self.enabled else {
            return;
        };
        let key = enabled.next_note_key();
        let inserted = enabled.bounded("insert_note", enabled.backend.insert_note(&key, text));
        if let Err(error) = inserted.await {
            warn!(event_name = "relay.note_failed", error = %error, "could not store note");
        }
    }

    /// Note at 1-based `index`; negative values count back from the latest.
    /// Empty when there is no such note.
    pub async fn show_note(&self, index: i64) -> String {
        let notes = self.notes().await;
        resolve_index(notes.len(), index)
            .and_then(|position| notes.into_iter().nth(position))
            .map(|(_, text)| text)
            .unwrap_or_default()
    }

    /// Every note keyed by its 1-based position in creation order.
    pub async fn show_all_notes(&self) -> BTreeMap<usize, String> {
        self.notes()
            .await
            .into_iter()
            .enumerate()
            .map(|(position, (_, text))| (position + 1, text))
            .collect()
    }

    /// Returns whether a note was removed; an out-of-range index is a no-op.
    pub async fn remove_note(&self, index: i64) -> bool {
        let Some(enabled) = &self.enabled else {
            return false;
        };
        let notes = self.notes().await;
        let Some(position) = resolve_index(notes.len(), index) else {
            return false;
        };
        let Some((key, _)) = notes.into_iter().nth(position) else {
            return false;
        };

        match enabled.bounded("delete_note", enabled.backend.delete_note(&key)).await {
            Ok(()) => true,
            Err(error) => {
                warn!(event_name = "relay.note_failed", error = %error, "could not remove note");
                false
            }
        }
    }

    pub async fn remove_all_notes(&self) {
        let Some(enabled) = &self.enabled else {
            return;
        };
        if let Err(error) = enabled.bounded("clear_notes", enabled.backend.clear_notes()).await {
            warn!(event_name = "relay.note_failed", error = %error, "could not remove notes");
        }
    }

    async fn notes(&self) -> Vec<(String, String)> {
        let Some(enabled) = &self.enabled else {
            return Vec::new();
        };
        match enabled.bounded("notes", enabled.backend.notes()).await {
            Ok(notes) => notes,
            Err(error) => {
                warn!(event_name = "relay.note_failed", error = %error, "could not read notes");
                Vec::new()
            }
        }
    }
}

impl EnabledRelay {
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, RelayError>>,
    ) -> Result<T, RelayError> {
        let after = self.operation_timeout;
        tokio::time::timeout(after, call)
            .await
            .map_err(|_elapsed| RelayError::Timeout { operation, after })?
    }

    /// Zero-padded microsecond timestamp, strictly increasing within the
    /// process so that lexical key order is creation order.
    fn next_note_key(&self) -> String {
        let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or_default();
        let previous = self
            .last_note_key
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or_else(|last| last);
        format!("{:020}", now.max(previous + 1))
    }
}

fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let magnitude = usize::try_from(index.unsigned_abs()).ok()?;
    if index > 0 {
        Some(magnitude - 1).filter(|position| *position < len)
    } else if index < 0 {
        len.checked_sub(magnitude)
    } else {
        None
    }
}
