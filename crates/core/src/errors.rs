use thiserror::Error;

/// A registered command that cannot run as configured. Surfaced to the
/// requesting user, never fatal to the process.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandConfigError {
    #[error("execute parameter is not configured for command \"{command}\"")]
    MissingExecute { command: String },
    #[error(
        "output format is not properly configured for command \"{command}\" \
         (\"{value}\" should be \"text\", \"json\" or \"none\")"
    )]
    InvalidOutputFormat { command: String, value: String },
}

impl CommandConfigError {
    pub fn command(&self) -> &str {
        match self {
            Self::MissingExecute { command } | Self::InvalidOutputFormat { command, .. } => command,
        }
    }

    pub fn user_message(&self) -> String {
        format!("Command \"{}\" is not properly configured.", self.command())
    }
}

/// A message arrived from a sender outside the trusted principal set.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("received message from un-trusted user \"{name}\" (user id \"{user_id}\")")]
pub struct AuthorizationError {
    pub user_id: String,
    pub name: String,
    pub text: String,
}

impl AuthorizationError {
    /// Alert delivered to the notify principal.
    pub fn alert_text(&self) -> String {
        format!(
            "Received message from un-trusted user \"{}\" (user id \"{}\"): {}",
            self.name, self.user_id, self.text
        )
    }
}

/// Failure while running a shell command. The executor converts every variant
/// into reply text; it never reaches the dispatcher as an error.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{detail}")]
    Spawn { detail: String },
    #[error("{stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("Command output was not JSON")]
    NotJson,
}

impl ExecutionError {
    pub fn user_message(&self, execute: &str) -> String {
        format!("Failed to execute command \"{execute}\": {self}")
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthorizationError, CommandConfigError, ExecutionError};

    #[test]
    fn command_config_errors_share_one_user_message() {
        let missing = CommandConfigError::MissingExecute { command: "backup".to_owned() };
        let invalid = CommandConfigError::InvalidOutputFormat {
            command: "backup".to_owned(),
            value: "xml".to_owned(),
        };

        assert_eq!(missing.user_message(), "Command \"backup\" is not properly configured.");
        assert_eq!(missing.user_message(), invalid.user_message());
        assert!(invalid.to_string().contains("\"xml\""));
    }

    #[test]
    fn authorization_alert_names_sender_and_text() {
        let error = AuthorizationError {
            user_id: "stranger==".to_owned(),
            name: "Mallory".to_owned(),
            text: "/reboot".to_owned(),
        };

        assert_eq!(
            error.alert_text(),
            "Received message from un-trusted user \"Mallory\" (user id \"stranger==\"): /reboot"
        );
    }

    #[test]
    fn execution_errors_embed_command() {
        let error = ExecutionError::NonZeroExit { code: Some(2), stderr: "disk full".to_owned() };
        assert_eq!(error.user_message("df -h"), "Failed to execute command \"df -h\": disk full");
        assert_eq!(
            ExecutionError::NotJson.user_message("weather"),
            "Failed to execute command \"weather\": Command output was not JSON"
        );
    }
}
