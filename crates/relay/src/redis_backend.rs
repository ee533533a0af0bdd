use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::backend::{presence_key, RelayBackend, RelaySubscription, NOTES_KEY};
use crate::error::RelayError;

/// Redis-backed relay. The connection manager is created on first use and
/// reconnects on its own afterwards.
pub struct RedisRelay {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
}

impl RedisRelay {
    pub fn open(url: &str) -> Result<Self, RelayError> {
        let client = redis::Client::open(url)?;
        Ok(Self { client, manager: OnceCell::new() })
    }

    async fn connection(&self) -> Result<ConnectionManager, RelayError> {
        let manager = self
            .manager
            .get_or_try_init(|| async { self.client.get_connection_manager().await })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl RelayBackend for RedisRelay {
    async fn ping(&self) -> Result<(), RelayError> {
        let mut conn = self.connection().await?;
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_presence(&self, user_id: &str, name: &str) -> Result<(), RelayError> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(presence_key(user_id), name).await?;
        Ok(())
    }

    async fn get_presence(&self, user_id: &str) -> Result<Option<String>, RelayError> {
        let mut conn = self.connection().await?;
        Ok(conn.get::<_, Option<String>>(presence_key(user_id)).await?)
    }

    async fn delete_presence(&self, user_id: &str) -> Result<(), RelayError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(presence_key(user_id)).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), RelayError> {
        let mut conn = self.connection().await?;
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn RelaySubscription>, RelayError> {
        let subscribe_error = |error: redis::RedisError| RelayError::Subscribe {
            channel: channel.to_owned(),
            detail: error.to_string(),
        };

        let mut pubsub = self.client.get_async_pubsub().await.map_err(subscribe_error)?;
        pubsub.subscribe(channel).await.map_err(subscribe_error)?;
        debug!(event_name = "relay.subscribed", channel = %channel, "subscribed to relay channel");

        Ok(Box::new(RedisSubscription { messages: pubsub.into_on_message().boxed() }))
    }

    async fn insert_note(&self, key: &str, text: &str) -> Result<(), RelayError> {
        let mut conn = self.connection().await?;
        conn.hset::<_, _, _, ()>(NOTES_KEY, key, text).await?;
        Ok(())
    }

    async fn notes(&self) -> Result<Vec<(String, String)>, RelayError> {
        let mut conn = self.connection().await?;
        let notes = conn.hgetall::<_, BTreeMap<String, String>>(NOTES_KEY).await?;
        Ok(notes.into_iter().collect())
    }

    async fn delete_note(&self, key: &str) -> Result<(), RelayError> {
        let mut conn = self.connection().await?;
        conn.hdel::<_, _, ()>(NOTES_KEY, key).await?;
        Ok(())
    }

    async fn clear_notes(&self) -> Result<(), RelayError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(NOTES_KEY).await?;
        Ok(())
    }
}

struct RedisSubscription {
    messages: BoxStream<'static, redis::Msg>,
}

#[async_trait]
impl RelaySubscription for RedisSubscription {
    async fn next_payload(&mut self) -> Result<String, RelayError> {
        let message = self.messages.next().await.ok_or(RelayError::SubscriptionClosed)?;
        Ok(message.get_payload::<String>()?)
    }
}
