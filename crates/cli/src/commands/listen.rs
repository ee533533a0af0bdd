use std::path::Path;
use std::sync::Arc;

use cmdbot_core::config::AppConfig;
use cmdbot_core::executor::CommandExecutor;
use cmdbot_relay::Relay;
use cmdbot_viber::{local_hostname, RelayListener, ViberClient};
use tokio::sync::watch;
use tracing::warn;

use crate::commands::{load_config, runtime, CommandResult};

/// Runs the relay listener daemon until Ctrl-C.
pub fn run(config_path: Option<&Path>) -> CommandResult {
    let config = match load_config("listen", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };
    init_logging(&config);

    let relay = match Relay::from_config(&config) {
        Ok(relay) if relay.is_enabled() => relay,
        Ok(_) => {
            return CommandResult::failure(
                "listen",
                "relay_disabled",
                "Viber \"redis_channel\" is not configured",
                2,
            );
        }
        Err(error) => return CommandResult::failure("listen", "relay_init", error.to_string(), 3),
    };
    let client = match ViberClient::from_config(&config.viber) {
        Ok(client) => client,
        Err(error) => return CommandResult::failure("listen", "client_init", error.to_string(), 3),
    };
    let listener = RelayListener::new(
        Arc::new(relay),
        CommandExecutor::default(),
        Arc::new(client),
        local_hostname(),
    );

    let runtime = match runtime("listen") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };
    runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    let _ = shutdown_tx.send(true);
                }
                Err(error) => {
                    warn!(error = %error, "cannot watch for Ctrl-C; listener runs until killed");
                    std::future::pending::<()>().await;
                }
            }
        });
        listen(&listener, shutdown_rx).await
    })
}

pub async fn listen(listener: &RelayListener, shutdown: watch::Receiver<bool>) -> CommandResult {
    match listener.start(shutdown).await {
        Ok(()) => CommandResult::success("listen", "relay listener stopped"),
        Err(error) => CommandResult::failure("listen", "relay", format!("{error:#}"), 4),
    }
}

fn init_logging(config: &AppConfig) {
    use cmdbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt().with_target(false).with_max_level(log_level);

    // A subscriber may already be installed when commands run in-process.
    let _ = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}
