use std::sync::Arc;

use cmdbot_core::config::ViberConfig;
use cmdbot_core::envelope::{is_addressed_to, RelayEnvelope};
use cmdbot_core::errors::AuthorizationError;
use cmdbot_core::executor::CommandExecutor;
use cmdbot_core::messages::reply_messages;
use cmdbot_core::registry::{CommandRegistry, OutputFormat, RunnableCommand};
use cmdbot_relay::Relay;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::MessageSender;
use crate::commands::{parse_message, BotCommand};
use crate::events::{ViberEvent, ViberUser};
use crate::workers::CommandWorkers;

pub const BUILD_INFO: &str = concat!("cmdbot ", env!("CARGO_PKG_VERSION"));
pub const NO_NOTES: &str = "No notes.";

/// Everything the dispatcher needs, built once at startup and shared by
/// every request.
pub struct AppContext {
    pub viber: ViberConfig,
    pub registry: CommandRegistry,
    pub relay: Arc<Relay>,
    pub sender: Arc<dyn MessageSender>,
    pub executor: CommandExecutor,
    pub workers: CommandWorkers,
    pub hostname: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acknowledgement {
    Ok,
    Forbidden,
}

#[derive(Debug)]
pub struct DispatchOutcome {
    pub acknowledgement: Acknowledgement,
    /// Command job still running on the worker pool, if one was started.
    pub job: Option<JoinHandle<()>>,
}

impl DispatchOutcome {
    fn ok() -> Self {
        Self { acknowledgement: Acknowledgement::Ok, job: None }
    }

    fn forbidden() -> Self {
        Self { acknowledgement: Acknowledgement::Forbidden, job: None }
    }

    fn started(job: JoinHandle<()>) -> Self {
        Self { acknowledgement: Acknowledgement::Ok, job: Some(job) }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    context: Arc<AppContext>,
}

impl Dispatcher {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn handle(&self, event: ViberEvent) -> DispatchOutcome {
        let correlation_id = Uuid::new_v4().to_string();
        debug!(
            event_name = "ingress.viber.event_received",
            correlation_id = %correlation_id,
            viber_event = event.event_name(),
            "received viber callback"
        );

        match event {
            ViberEvent::ConversationStarted { user } => {
                self.context.relay.conversation_started(&user.id, &user.name).await;
                self.greet(&user, &correlation_id).await;
                DispatchOutcome::ok()
            }
            ViberEvent::Subscribed { user } => {
                info!(
                    event_name = "ingress.viber.subscribed",
                    correlation_id = %correlation_id,
                    user_id = %user.id,
                    user_name = %user.name,
                    "user subscribed"
                );
                self.context.relay.subscribe_user(&user.id, &user.name).await;
                self.greet(&user, &correlation_id).await;
                DispatchOutcome::ok()
            }
            ViberEvent::Unsubscribed { user_id } => {
                info!(
                    event_name = "ingress.viber.unsubscribed",
                    correlation_id = %correlation_id,
                    user_id = %user_id,
                    "user un-subscribed"
                );
                self.context.relay.unsubscribe_user(&user_id).await;
                DispatchOutcome::ok()
            }
            ViberEvent::Failed { user_id, description } => {
                warn!(
                    event_name = "ingress.viber.delivery_failed",
                    correlation_id = %correlation_id,
                    user_id = %user_id,
                    description = %description,
                    "client failed receiving message"
                );
                DispatchOutcome::ok()
            }
            ViberEvent::Other { event } => {
                debug!(
                    event_name = "ingress.viber.ignored",
                    correlation_id = %correlation_id,
                    viber_event = %event,
                    "ignoring viber callback"
                );
                DispatchOutcome::ok()
            }
            ViberEvent::Message { sender, text } => {
                self.handle_message(sender, text, &correlation_id).await
            }
        }
    }

    async fn handle_message(
        &self,
        sender: ViberUser,
        text: String,
        correlation_id: &str,
    ) -> DispatchOutcome {
        let context = &self.context;

        if !context.viber.is_trusted(&sender.id) {
            let rejection = AuthorizationError {
                user_id: sender.id.clone(),
                name: sender.name.clone(),
                text: text.clone(),
            };
            warn!(
                event_name = "ingress.viber.untrusted_sender",
                correlation_id = %correlation_id,
                user_id = %sender.id,
                error = %rejection,
                "rejected message from un-trusted user"
            );
            self.reply(&context.viber.notify_user_id, &rejection.alert_text(), correlation_id)
                .await;
            return DispatchOutcome::forbidden();
        }

        info!(
            event_name = "ingress.viber.message_received",
            correlation_id = %correlation_id,
            user_id = %sender.id,
            user_name = %sender.name,
            text = %text,
            "message from trusted user"
        );
        context.relay.refresh_user(&sender.id, &sender.name).await;
        context.relay.publish(RelayEnvelope::text(&sender.id, &text, &sender.name)).await;

        let Some(parsed) = parse_message(&text) else {
            return DispatchOutcome::ok();
        };
        // Relayed commands carry their destination to the listeners instead.
        let relayed =
            context.viber.command_executor && matches!(parsed.command, BotCommand::Registered(_));
        if !relayed && !is_addressed_to(&parsed.destination, &context.hostname) {
            debug!(
                event_name = "dispatch.not_addressed",
                correlation_id = %correlation_id,
                hostname = %context.hostname,
                destination = ?parsed.destination,
                "command is addressed to other hosts"
            );
            return DispatchOutcome::ok();
        }

        let reply = match parsed.command {
            BotCommand::Help => context.registry.help_text(),
            BotCommand::Version => BUILD_INFO.to_owned(),
            BotCommand::Echo(None) => ":-)".to_owned(),
            BotCommand::Echo(Some(text)) => text,
            BotCommand::AddNote(note) => {
                context.relay.add_note(&note).await;
                return DispatchOutcome::ok();
            }
            BotCommand::ShowNote(index) => {
                Some(context.relay.show_note(index).await)
                    .filter(|note| !note.is_empty())
                    .unwrap_or_else(|| NO_NOTES.to_owned())
            }
            BotCommand::ShowAllNotes => {
                let notes = context.relay.show_all_notes().await;
                if notes.is_empty() {
                    NO_NOTES.to_owned()
                } else {
                    notes
                        .iter()
                        .map(|(position, note)| format!("{position}: {note}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            BotCommand::RemoveNote(index) => {
                context.relay.remove_note(index).await;
                "Note removed.".to_owned()
            }
            BotCommand::RemoveAllNotes => {
                context.relay.remove_all_notes().await;
                "All notes removed.".to_owned()
            }
            BotCommand::InvalidNoteIndex(index) => {
                format!("Invalid note index \"{index}\", try \"/help\".")
            }
            BotCommand::Registered(name) => {
                return self
                    .dispatch_registered(&sender, &name, parsed.destination, correlation_id)
                    .await;
            }
        };

        self.reply(&sender.id, &reply, correlation_id).await;
        DispatchOutcome::ok()
    }

    async fn dispatch_registered(
        &self,
        sender: &ViberUser,
        name: &str,
        destination: Vec<String>,
        correlation_id: &str,
    ) -> DispatchOutcome {
        let context = &self.context;

        let Some(definition) = context.registry.get(name) else {
            warn!(
                event_name = "dispatch.unsupported_command",
                correlation_id = %correlation_id,
                user_id = %sender.id,
                command = %name,
                "un-supported command"
            );
            let reply = format!("Command \"{name}\" is not supported, try \"/help\".");
            self.reply(&sender.id, &reply, correlation_id).await;
            return DispatchOutcome::ok();
        };

        let command = match definition.runnable() {
            Ok(command) => command,
            Err(error) => {
                warn!(
                    event_name = "dispatch.command_misconfigured",
                    correlation_id = %correlation_id,
                    command = %name,
                    error = %error,
                    "command is not properly configured"
                );
                self.reply(&sender.id, &error.user_message(), correlation_id).await;
                return DispatchOutcome::ok();
            }
        };

        if context.viber.command_executor {
            info!(
                event_name = "dispatch.command_relayed",
                correlation_id = %correlation_id,
                user_id = %sender.id,
                command = %command.name,
                "relaying command to listeners"
            );
            let envelope = RelayEnvelope::execute(
                &sender.id,
                &command.execute,
                &sender.name,
                command.output_format,
            )
            .with_destination(destination);
            context.relay.publish(envelope).await;
            return DispatchOutcome::ok();
        }

        info!(
            event_name = "dispatch.command_started",
            correlation_id = %correlation_id,
            user_id = %sender.id,
            command = %command.name,
            "running command"
        );
        let job = run_command(self.context.clone(), sender.id.clone(), command);
        DispatchOutcome::started(context.workers.spawn(name, job))
    }

    async fn greet(&self, user: &ViberUser, correlation_id: &str) {
        let text = format!("Hello, {}!\n\n{}", user.name, self.context.registry.help_text());
        self.reply(&user.id, &text, correlation_id).await;
    }

    async fn reply(&self, user_id: &str, text: &str, correlation_id: &str) {
        deliver(self.context.sender.as_ref(), user_id, text, None, correlation_id).await;
    }
}

async fn run_command(context: Arc<AppContext>, user_id: String, command: RunnableCommand) {
    let output = context.executor.run(&command.execute, command.output_format).await;
    if command.output_format == OutputFormat::None {
        debug!(
            event_name = "dispatch.command_silent",
            user_id = %user_id,
            command = %command.name,
            "command finished without reply"
        );
        return;
    }

    let correlation_id = Uuid::new_v4().to_string();
    let media = output.media.as_deref();
    deliver(context.sender.as_ref(), &user_id, &output.text, media, &correlation_id).await;
    let mirror = RelayEnvelope::text(&user_id, &output.text, "").with_media(output.media);
    context.relay.publish(mirror).await;
}

/// Sends `text` (chunked) and an optional media URL. Failures are logged.
pub(crate) async fn deliver(
    sender: &dyn MessageSender,
    user_id: &str,
    text: &str,
    media: Option<&str>,
    correlation_id: &str,
) {
    let messages = reply_messages(text, media);
    if messages.is_empty() {
        return;
    }
    if let Err(error) = sender.send(user_id, &messages).await {
        warn!(
            event_name = "egress.viber.send_failed",
            correlation_id = %correlation_id,
            user_id = %user_id,
            error = %error,
            "could not deliver reply"
        );
    }
}

/// Local host name used for command destination filtering.
pub fn local_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(error) => {
            warn!(error = %error, "could not read host name, using localhost");
            "localhost".to_owned()
        }
    }
}
