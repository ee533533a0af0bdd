pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "cmdbot",
    about = "cmdbot operator CLI",
    long_about = "Register the Viber webhook, send messages, run the relay listener, and inspect \
                  configuration.",
    after_help = "Examples:\n  cmdbot register\n  cmdbot send --media-url https://cam/1.jpg \
                  \"front door\"\n  cmdbot listen\n  cmdbot config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Configuration file (defaults to $VIBER_CONF)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Register the webhook with Viber")]
    Register {
        #[arg(long, help = "Webhook URL to register instead of the configured one")]
        webhook: Option<String>,
    },
    #[command(about = "Remove the webhook from Viber")]
    Unregister,
    #[command(about = "Send a text and/or media URL message to a Viber user")]
    Send {
        #[arg(long, help = "Recipient user id (defaults to Viber.notify_user_id)")]
        user_id: Option<String>,
        #[arg(long, help = "Media URL sent after the text")]
        media_url: Option<String>,
        message: Option<String>,
    },
    #[command(about = "Run the relay listener that executes relayed commands on this host")]
    Listen,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Command::Register { webhook } => commands::register::run(config_path, webhook),
        Command::Unregister => commands::unregister::run(config_path),
        Command::Send { user_id, media_url, message } => {
            commands::send::run(config_path, user_id, media_url, message)
        }
        Command::Listen => commands::listen::run(config_path),
        Command::Config => commands::config::run(config_path),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
