//! Named shell commands loaded from `Command <name>` configuration sections.
//!
//! Definitions are kept exactly as configured. Whether a definition can run
//! is decided when it is dispatched, so that a broken entry produces a reply
//! to the user instead of a startup failure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::errors::CommandConfigError;

pub const COMMAND_SECTION_PREFIX: &str = "Command ";

/// Built-in commands with their help text. Dispatch resolves these before
/// looking at the registry.
pub const BUILTIN_COMMANDS: &[(&str, &str)] = &[
    ("echo", "Echo the text sent to the bot (internal command)."),
    ("version", "Show the bot version (internal command)."),
    ("note", "Save a note, or show the latest note when sent without text (internal command)."),
    ("notes", "Show all notes (internal command)."),
    ("noteN", "Show note N, negative N counts back from the latest (internal command)."),
    ("removenote", "Remove the latest note (internal command)."),
    ("removenoteN", "Remove note N (internal command)."),
    ("removenotes", "Remove all notes (internal command)."),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    None,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::None => "none",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandDefinition {
    pub name: String,
    pub execute: Option<String>,
    pub output_format: Option<String>,
    pub help: Option<String>,
}

/// A definition that passed dispatch-time validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnableCommand {
    pub name: String,
    pub execute: String,
    pub output_format: OutputFormat,
}

impl CommandDefinition {
    pub fn from_section(name: &str, values: &BTreeMap<String, String>) -> Self {
        Self {
            name: name.to_owned(),
            execute: values.get("execute").cloned(),
            output_format: values.get("output_format").cloned(),
            help: values.get("help").cloned(),
        }
    }

    pub fn runnable(&self) -> Result<RunnableCommand, CommandConfigError> {
        let execute = self
            .execute
            .clone()
            .ok_or_else(|| CommandConfigError::MissingExecute { command: self.name.clone() })?;

        let output_format = match self.output_format.as_deref() {
            None => OutputFormat::Text,
            Some(raw) => OutputFormat::parse(raw).ok_or_else(|| {
                CommandConfigError::InvalidOutputFormat {
                    command: self.name.clone(),
                    value: raw.to_owned(),
                }
            })?,
        };

        Ok(RunnableCommand { name: self.name.clone(), execute, output_format })
    }
}

#[derive(Clone, Debug, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandDefinition>,
}

impl CommandRegistry {
    pub fn load(config: &AppConfig) -> Self {
        Self::from_definitions(
            config
                .sections_with_prefix(COMMAND_SECTION_PREFIX)
                .map(|(name, values)| CommandDefinition::from_section(name, values)),
        )
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = CommandDefinition>) -> Self {
        let commands = definitions
            .into_iter()
            .map(|definition| (definition.name.clone(), definition))
            .collect();
        Self { commands }
    }

    pub fn get(&self, name: &str) -> Option<&CommandDefinition> {
        self.commands.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn help_text(&self) -> String {
        let mut entries = self
            .commands
            .values()
            .map(|definition| {
                let help = definition.help.clone().unwrap_or_else(|| {
                    format!("Help is not available for command \"{}\".", definition.name)
                });
                (definition.name.as_str(), help)
            })
            .collect::<BTreeMap<_, _>>();
        for &(name, help) in BUILTIN_COMMANDS {
            entries.insert(name, help.to_owned());
        }

        let width = entries.keys().map(|name| name.chars().count()).max().unwrap_or(0);
        let mut text = String::from("Available commands:\n\n");
        for (name, help) in entries {
            text.push_str(&format!("/{name:<width$} -- {help}\n"));
        }
        text
    }
}
