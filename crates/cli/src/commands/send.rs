use std::path::Path;

use cmdbot_core::messages::reply_messages;
use cmdbot_viber::{MessageSender, ViberClient};

use crate::commands::{load_config, runtime, CommandResult};

/// Sends `message` and/or `media_url` to `user_id`, defaulting to the
/// configured notify user.
pub fn run(
    config_path: Option<&Path>,
    user_id: Option<String>,
    media_url: Option<String>,
    message: Option<String>,
) -> CommandResult {
    let config = match load_config("send", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let user_id = user_id.unwrap_or_else(|| config.viber.notify_user_id.clone());

    let client = match ViberClient::from_config(&config.viber) {
        Ok(client) => client,
        Err(error) => return CommandResult::failure("send", "client_init", error.to_string(), 3),
    };
    match runtime("send") {
        Ok(runtime) => runtime.block_on(send(
            &client,
            &user_id,
            message.as_deref().unwrap_or_default(),
            media_url.as_deref(),
        )),
        Err(result) => result,
    }
}

pub async fn send(
    sender: &dyn MessageSender,
    user_id: &str,
    message: &str,
    media_url: Option<&str>,
) -> CommandResult {
    let messages = reply_messages(message, media_url);
    if messages.is_empty() {
        return CommandResult::success("send", "nothing to send");
    }

    match sender.send(user_id, &messages).await {
        Ok(()) => {
            let summary = format!("sent {} message(s) to {user_id}", messages.len());
            CommandResult::success("send", summary)
        }
        Err(error) => CommandResult::failure(
            "send",
            "viber_api",
            format!("failed to send message: {error}"),
            4,
        ),
    }
}
