//! chatd: a line-oriented TCP chat server.
//!
//! Clients connect, send a nickname as their first line, then chat with
//! everybody or privately through `/` commands. A single event loop task
//! owns all client state; per-connection tasks only frame input lines and
//! write queued output.

pub mod config;
pub mod conn;
pub mod error;
pub mod outbox;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
pub mod signal;

pub use config::Config;
pub use server::Server;
