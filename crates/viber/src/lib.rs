//! Viber transport and command dispatch.
//!
//! - **Events** (`events`) - callback decoding into a closed `ViberEvent` sum
//! - **Signature** (`signature`) - `X-Viber-Content-Signature` verification
//! - **Client** (`client`) - outbound REST calls behind `MessageSender`
//! - **Commands** (`commands`) - slash-command parsing and host destinations
//! - **Dispatcher** (`dispatcher`) - trust check, routing, replies
//! - **Workers** (`workers`) - bounded, supervised pool for command jobs
//! - **Listener** (`listener`) - relay channel consumer with reconnect backoff
//!
//! ```text
//! webhook → parse_event → Dispatcher ─┬→ CommandWorkers → CommandExecutor → sender
//!                                     └→ Relay ─(execute)─→ RelayListener → sender
//! ```

pub mod client;
pub mod commands;
pub mod dispatcher;
pub mod events;
pub mod listener;
pub mod signature;
pub mod workers;

pub use client::{MessageSender, RecordingSender, SendError, ViberClient};
pub use dispatcher::{local_hostname, Acknowledgement, AppContext, DispatchOutcome, Dispatcher};
pub use events::{parse_event, EventParseError, ViberEvent, ViberUser};
pub use listener::{ReconnectPolicy, RelayListener};
pub use signature::{verify_signature, SIGNATURE_HEADER};
pub use workers::CommandWorkers;
