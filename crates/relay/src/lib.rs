//! Relay store for the command bot.
//!
//! A thin layer over a key/value + pub/sub broker holding three kinds of
//! state: user presence, operator notes and the broadcast channel that
//! listening workers consume.
//!
//! ```text
//! Dispatcher ─┐                         ┌─> RelayListener (any host)
//!             ├─> Relay ─> RelayBackend ─┤
//! CLI ────────┘     (Option)             └─> notes / presence keys
//! ```
//!
//! `Relay` is the only entry point. When no channel is configured it holds no
//! backend and every operation quietly returns an empty value.

pub mod backend;
pub mod error;
pub mod memory;
pub mod redis_backend;
pub mod store;

pub use backend::{RelayBackend, RelaySubscription};
pub use error::RelayError;
pub use memory::InMemoryRelay;
pub use redis_backend::RedisRelay;
pub use store::{Relay, DEFAULT_OPERATION_TIMEOUT, DEFAULT_RECEIVE_TIMEOUT};
