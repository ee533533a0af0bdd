mod bootstrap;
mod health;
mod webhook;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cmdbot_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use cmdbot_viber::ViberClient;

#[derive(Debug, Parser)]
#[command(
    name = "cmdbot-server",
    about = "Command bot using Viber",
    after_help = "The webhook is served over plain HTTP. Terminate TLS in a reverse proxy in \
                  front of it; there are no --tls-certificate or --tls-private-key flags."
)]
struct Args {
    /// Configuration file; defaults to `$VIBER_CONF` or the system path.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, help = "Register the webhook with Viber and exit")]
    register: bool,
    #[arg(long = "un-register", help = "Remove the webhook from Viber and exit")]
    un_register: bool,
    #[arg(long, help = "Webhook URL to register instead of the configured one")]
    webhook: Option<String>,
    #[arg(long)]
    listen_address: Option<String>,
    #[arg(long)]
    listen_port: Option<u16>,
    #[arg(long, help = "Log at debug level")]
    debug: bool,
}

impl Args {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: true,
            overrides: ConfigOverrides {
                log_level: self.debug.then(|| "debug".to_owned()),
                webhook: self.webhook.clone(),
                listen_address: self.listen_address.clone(),
                listen_port: self.listen_port,
            },
        }
    }
}

fn init_logging(config: &AppConfig) {
    use cmdbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run(Args::parse()).await
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::load(args.load_options())?;
    init_logging(&config);

    if args.register || args.un_register {
        return manage_webhook(&config, args.register).await;
    }

    let app = bootstrap::bootstrap_with_config(config)?;
    webhook::spawn(
        &app.config.server.listen_address,
        app.config.server.listen_port,
        app.dispatcher.clone(),
    )
    .await
    .context("could not bind webhook listener")?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bot_name = %app.config.viber.name,
        webhook = %app.config.viber.webhook,
        "cmdbot-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "cmdbot-server stopping"
    );

    Ok(())
}

async fn manage_webhook(config: &AppConfig, register: bool) -> Result<()> {
    let client = ViberClient::from_config(&config.viber)?;
    if register {
        print!("Registering webhook \"{}\" ... ", config.viber.webhook);
        client.set_webhook(&config.viber.webhook).await.context("failed to register bot")?;
    } else {
        print!("Un-registering webhook ... ");
        client.remove_webhook().await.context("failed to un-register bot")?;
    }
    println!("OK.");
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
