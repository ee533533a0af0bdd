pub mod config;
pub mod envelope;
pub mod errors;
pub mod executor;
pub mod messages;
pub mod registry;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use envelope::{split_destination, EnvelopeKind, RelayEnvelope};
pub use errors::{AuthorizationError, CommandConfigError, ExecutionError};
pub use executor::{CommandExecutor, CommandOutput};
pub use messages::{reply_messages, split_text, OutboundMessage};
pub use registry::{CommandDefinition, CommandRegistry, OutputFormat, RunnableCommand};
