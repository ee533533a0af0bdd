use std::sync::Arc;

use cmdbot_core::config::{AppConfig, ConfigError};
use cmdbot_core::executor::CommandExecutor;
use cmdbot_core::registry::CommandRegistry;
use cmdbot_relay::{Relay, RelayError};
use cmdbot_viber::{local_hostname, AppContext, CommandWorkers, Dispatcher, SendError, ViberClient};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub dispatcher: Dispatcher,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("relay setup failed: {0}")]
    Relay(#[source] RelayError),
    #[error("viber client setup failed: {0}")]
    Client(#[source] SendError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let relay = Relay::from_config(&config).map_err(BootstrapError::Relay)?;
    info!(
        event_name = "system.bootstrap.relay_configured",
        correlation_id = "bootstrap",
        relay_enabled = relay.is_enabled(),
        channel = relay.channel().unwrap_or_default(),
        command_executor = config.viber.command_executor,
        "relay configured"
    );

    let client = ViberClient::from_config(&config.viber).map_err(BootstrapError::Client)?;
    let registry = CommandRegistry::load(&config);
    info!(
        event_name = "system.bootstrap.commands_loaded",
        correlation_id = "bootstrap",
        command_count = registry.len(),
        "command registry loaded"
    );

    let context = AppContext {
        viber: config.viber.clone(),
        registry,
        relay: Arc::new(relay),
        sender: Arc::new(client),
        executor: CommandExecutor::default(),
        workers: CommandWorkers::new(config.server.worker_limit),
        hostname: local_hostname(),
    };

    Ok(Application { config, dispatcher: Dispatcher::new(Arc::new(context)) })
}
