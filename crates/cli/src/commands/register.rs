use std::path::Path;

use cmdbot_viber::ViberClient;

use crate::commands::{load_config, runtime, CommandResult};

pub fn run(config_path: Option<&Path>, webhook: Option<String>) -> CommandResult {
    let config = match load_config("register", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let webhook = webhook.unwrap_or_else(|| config.viber.webhook.clone());

    let client = match ViberClient::from_config(&config.viber) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure("register", "client_init", error.to_string(), 3)
        }
    };
    match runtime("register") {
        Ok(runtime) => runtime.block_on(register(&client, &webhook)),
        Err(result) => result,
    }
}

pub async fn register(client: &ViberClient, webhook: &str) -> CommandResult {
    match client.set_webhook(webhook).await {
        Ok(()) => CommandResult::success("register", format!("registered webhook {webhook}")),
        Err(error) => CommandResult::failure(
            "register",
            "viber_api",
            format!("failed to register bot: {error}"),
            4,
        ),
    }
}
