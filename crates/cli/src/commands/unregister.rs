use std::path::Path;

use cmdbot_viber::ViberClient;

use crate::commands::{load_config, runtime, CommandResult};

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let config = match load_config("unregister", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let client = match ViberClient::from_config(&config.viber) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure("unregister", "client_init", error.to_string(), 3)
        }
    };
    match runtime("unregister") {
        Ok(runtime) => runtime.block_on(unregister(&client)),
        Err(result) => result,
    }
}

pub async fn unregister(client: &ViberClient) -> CommandResult {
    match client.remove_webhook().await {
        Ok(()) => CommandResult::success("unregister", "webhook removed"),
        Err(error) => CommandResult::failure(
            "unregister",
            "viber_api",
            format!("failed to un-register bot: {error}"),
            4,
        ),
    }
}
