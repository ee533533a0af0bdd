use std::time::Duration;

use async_trait::async_trait;
use cmdbot_core::config::ViberConfig;
use cmdbot_core::messages::OutboundMessage;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://chatapi.viber.com/pa";
const AUTH_TOKEN_HEADER: &str = "X-Viber-Auth-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const WEBHOOK_EVENT_TYPES: &[&str] =
    &["delivered", "seen", "failed", "subscribed", "unsubscribed", "conversation_started"];

#[derive(Debug, Error)]
pub enum SendError {
    #[error("viber request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("viber API returned status {status}: {message}")]
    Api { status: i64, message: String },
}

/// Delivers bot messages to a user, in order.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, user_id: &str, messages: &[OutboundMessage]) -> Result<(), SendError>;
}

#[derive(Serialize)]
struct Sender<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessageBody<'a> {
    Text { text: &'a str },
    Url { media: &'a str },
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    receiver: &'a str,
    min_api_version: u8,
    sender: Sender<'a>,
    #[serde(flatten)]
    body: MessageBody<'a>,
}

#[derive(Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_types: Option<&'a [&'a str]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    send_name: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: i64,
    #[serde(default)]
    status_message: String,
}

/// REST client for the Viber bot API.
pub struct ViberClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    name: String,
    avatar: Option<String>,
}

impl ViberClient {
    pub fn from_config(config: &ViberConfig) -> Result<Self, SendError> {
        Self::with_base_url(config, DEFAULT_API_BASE)
    }

    pub fn with_base_url(config: &ViberConfig, base_url: &str) -> Result<Self, SendError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: config.authentication_token.clone(),
            name: config.name.clone(),
            avatar: config.avatar.clone(),
        })
    }

    pub async fn set_webhook(&self, url: &str) -> Result<(), SendError> {
        info!(event_name = "viber.webhook_set", url = %url, "registering webhook");
        let request = SetWebhookRequest {
            url,
            event_types: Some(WEBHOOK_EVENT_TYPES),
            send_name: Some(true),
        };
        self.post("set_webhook", &request).await
    }

    pub async fn remove_webhook(&self) -> Result<(), SendError> {
        info!(event_name = "viber.webhook_removed", "removing webhook");
        let request = SetWebhookRequest { url: "", event_types: None, send_name: None };
        self.post("set_webhook", &request).await
    }

    async fn post<T>(&self, endpoint: &str, body: &T) -> Result<(), SendError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let response = self
            .http
            .post(format!("{}/{endpoint}", self.base_url))
            .header(AUTH_TOKEN_HEADER, self.token.expose_secret())
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json::<ApiResponse>()
            .await?;

        if response.status != 0 {
            let ApiResponse { status, status_message: message } = response;
            return Err(SendError::Api { status, message });
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSender for ViberClient {
    async fn send(&self, user_id: &str, messages: &[OutboundMessage]) -> Result<(), SendError> {
        for message in messages {
            let body = match message {
                OutboundMessage::Text(text) => MessageBody::Text { text },
                OutboundMessage::Url(media) => MessageBody::Url { media },
            };
            let request = SendMessageRequest {
                receiver: user_id,
                min_api_version: 1,
                sender: Sender { name: &self.name, avatar: self.avatar.as_deref() },
                body,
            };
            self.post("send_message", &request).await?;
        }

        debug!(
            event_name = "viber.message_sent",
            user_id = %user_id,
            message_count = messages.len(),
            "sent viber messages"
        );
        Ok(())
    }
}

/// Sender that keeps every delivery in memory instead of calling Viber.
#[derive(Default)]
pub struct RecordingSender {
    deliveries: Mutex<Vec<(String, Vec<OutboundMessage>)>>,
}

impl RecordingSender {
    pub async fn deliveries(&self) -> Vec<(String, Vec<OutboundMessage>)> {
        self.deliveries.lock().await.clone()
    }

    /// Plain text of every message delivered to `user_id`.
    pub async fn texts_for(&self, user_id: &str) -> Vec<String> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter(|(recipient, _)| recipient == user_id)
            .flat_map(|(_, messages)| messages.iter())
            .filter_map(|message| match message {
                OutboundMessage::Text(text) => Some(text.clone()),
                OutboundMessage::Url(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, user_id: &str, messages: &[OutboundMessage]) -> Result<(), SendError> {
        self.deliveries.lock().await.push((user_id.to_owned(), messages.to_vec()));
        Ok(())
    }
}
