use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::OutputFormat;

pub const DESTINATION_SEPARATOR: char = '@';

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    #[default]
    Text,
    /// `text` carries a shell command for a listener to run.
    Execute,
}

/// Unit broadcast on the relay channel. Decoding ignores unknown fields and
/// fills in defaults for missing optional ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub destination: Vec<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: EnvelopeKind,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "Utc::now")]
    pub date: DateTime<Utc>,
}

impl RelayEnvelope {
    pub fn text(
        user_id: impl Into<String>,
        text: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            media: None,
            destination: Vec::new(),
            name: name.into(),
            kind: EnvelopeKind::Text,
            output_format: OutputFormat::Text,
            date: Utc::now(),
        }
    }

    pub fn execute(
        user_id: impl Into<String>,
        execute: impl Into<String>,
        name: impl Into<String>,
        output_format: OutputFormat,
    ) -> Self {
        Self { kind: EnvelopeKind::Execute, output_format, ..Self::text(user_id, execute, name) }
    }

    pub fn with_media(mut self, media: Option<String>) -> Self {
        self.media = media;
        self
    }

    pub fn with_destination(mut self, destination: Vec<String>) -> Self {
        self.destination = destination;
        self
    }

    pub fn is_addressed_to(&self, host: &str) -> bool {
        is_addressed_to(&self.destination, host)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Splits `command@host1,host2` into the command and its destination hosts.
/// The hosts follow the last separator, which must either sit on the
/// command name itself or start a word of its own (`echo hi @alpha`).
/// Anything else, such as `note mail bob@example.com`, is left whole and
/// addressed to every host.
pub fn split_destination(command_line: &str) -> (&str, Vec<String>) {
    let Some((command, hosts)) = command_line.rsplit_once(DESTINATION_SEPARATOR) else {
        return (command_line, Vec::new());
    };
    let on_command_name = !command.trim().contains(char::is_whitespace);
    let own_word = command.is_empty() || command.ends_with(char::is_whitespace);
    if !(on_command_name || own_word) || !is_host_list(hosts) {
        return (command_line, Vec::new());
    }

    let hosts = hosts
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_owned)
        .collect();
    (command.trim_end(), hosts)
}

fn is_host_list(hosts: &str) -> bool {
    hosts.split(',').map(str::trim).all(|host| {
        host.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
    })
}

pub fn is_addressed_to(destination: &[String], host: &str) -> bool {
    destination.is_empty() || destination.iter().any(|target| target.eq_ignore_ascii_case(host))
}
