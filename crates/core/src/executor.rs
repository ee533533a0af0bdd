use std::process::Stdio;

use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::ExecutionError;
use crate::registry::OutputFormat;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub media: Option<String>,
}

/// Runs configured commands through a shell and turns every outcome,
/// including failures, into reply text.
#[derive(Clone, Debug)]
pub struct CommandExecutor {
    shell: String,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self { shell: "/bin/sh".to_owned() }
    }
}

impl CommandExecutor {
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }

    pub async fn run(&self, execute: &str, output_format: OutputFormat) -> CommandOutput {
        match self.try_run(execute, output_format).await {
            Ok(output) => output,
            Err(error) => {
                warn!(
                    event_name = "command.execution_failed",
                    command = %execute,
                    error = %error,
                    "command execution failed"
                );
                CommandOutput { text: error.user_message(execute), media: None }
            }
        }
    }

    async fn try_run(
        &self,
        execute: &str,
        output_format: OutputFormat,
    ) -> Result<CommandOutput, ExecutionError> {
        debug!(event_name = "command.execution_started", command = %execute, "running command");

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(execute)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|error| ExecutionError::Spawn { detail: error.to_string() })?;

        if !output.status.success() {
            return Err(ExecutionError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        match output_format {
            OutputFormat::Json => parse_json_output(&stdout),
            OutputFormat::Text | OutputFormat::None => {
                Ok(CommandOutput { text: stdout, media: None })
            }
        }
    }
}

fn parse_json_output(stdout: &str) -> Result<CommandOutput, ExecutionError> {
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(stdout) else {
        warn!(
            event_name = "command.output_not_json",
            output = %stdout,
            "command output was not a JSON object"
        );
        return Err(ExecutionError::NotJson);
    };

    let text = fields.get("text").and_then(Value::as_str).unwrap_or_default().to_owned();
    let media = fields.get("media").and_then(Value::as_str).map(str::to_owned);
    Ok(CommandOutput { text, media })
}
