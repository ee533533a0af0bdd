use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ViberUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Callback delivered to the webhook. Delivery receipts, seen receipts and
/// the webhook handshake all land in `Other`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViberEvent {
    ConversationStarted { user: ViberUser },
    Message { sender: ViberUser, text: String },
    Subscribed { user: ViberUser },
    Unsubscribed { user_id: String },
    Failed { user_id: String, description: String },
    Other { event: String },
}

impl ViberEvent {
    pub fn event_name(&self) -> &str {
        match self {
            Self::ConversationStarted { .. } => "conversation_started",
            Self::Message { .. } => "message",
            Self::Subscribed { .. } => "subscribed",
            Self::Unsubscribed { .. } => "unsubscribed",
            Self::Failed { .. } => "failed",
            Self::Other { event } => event,
        }
    }
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("callback body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{event}` callback is missing `{field}`")]
    MissingField { event: String, field: &'static str },
}

#[derive(Debug, Deserialize)]
struct RawCallback {
    event: String,
    user: Option<ViberUser>,
    sender: Option<ViberUser>,
    user_id: Option<String>,
    message: Option<RawMessage>,
    desc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type", default)]
    kind: String,
    text: Option<String>,
}

pub fn parse_event(body: &[u8]) -> Result<ViberEvent, EventParseError> {
    let raw = serde_json::from_slice::<RawCallback>(body)?;
    let missing = |field| EventParseError::MissingField { event: raw.event.clone(), field };

    let event = match raw.event.as_str() {
        "conversation_started" => {
            ViberEvent::ConversationStarted { user: raw.user.ok_or_else(|| missing("user"))? }
        }
        "subscribed" => ViberEvent::Subscribed { user: raw.user.ok_or_else(|| missing("user"))? },
        "unsubscribed" => {
            ViberEvent::Unsubscribed { user_id: raw.user_id.ok_or_else(|| missing("user_id"))? }
        }
        "failed" => ViberEvent::Failed {
            user_id: raw.user_id.ok_or_else(|| missing("user_id"))?,
            description: raw.desc.unwrap_or_default(),
        },
        "message" => {
            let sender = raw.sender.ok_or_else(|| missing("sender"))?;
            let text = raw
                .message
                .filter(|message| message.kind == "text")
                .and_then(|message| message.text)
                .unwrap_or_default();
            ViberEvent::Message { sender, text }
        }
        other => ViberEvent::Other { event: other.to_owned() },
    };

    Ok(event)
}
