use thiserror::Error;

use crate::registry::ConnId;

/// Reasons a nickname claim is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NickError {
    #[error("nickname may not be empty")]
    Empty,

    #[error("nickname '{0}' is already taken")]
    Taken(String),

    #[error("nicknames may not contain whitespace")]
    Whitespace,

    #[error("nicknames may be at most {0} characters")]
    TooLong(usize),

    #[error("connection {0} is not registered")]
    UnknownConnection(ConnId),
}

/// Command lines that cannot be dispatched. The message is the reply sent
/// back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Usage: /send <name> <message>")]
    SendUsage,

    #[error("Usage: /all <message>")]
    AllUsage,

    #[error("Unknown command: use /help")]
    Unknown(String),
}
