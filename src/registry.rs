use std::collections::HashMap;
use std::fmt;

use tokio::task::AbortHandle;

use crate::error::NickError;
use crate::outbox::Outbox;

/// Handle of one accepted connection. Never reused within a process, so a
/// recycled socket descriptor can not alias an earlier client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl ConnId {
    #[cfg(test)]
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registry entry of a live connection.
#[derive(Debug)]
pub struct Client {
    nick: String,
    outbox: Outbox,
    reader: Option<AbortHandle>,
}

impl Client {
    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn is_named(&self) -> bool {
        !self.nick.is_empty()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Stops the reader, releasing the read half of the socket.
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Who is online: connection handles and the nicknames they hold.
///
/// Owned by the event loop and never shared, so every operation here runs
/// to completion before any other one starts.
#[derive(Debug, Default)]
pub struct Registry {
    clients: HashMap<ConnId, Client>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection with no nickname yet.
    pub fn register(&mut self, outbox: Outbox) -> ConnId {
        self.next_id += 1;
        let id = ConnId(self.next_id);

        self.clients.insert(
            id,
            Client {
                nick: String::new(),
                outbox,
                reader: None,
            },
        );

        id
    }

    /// Ties the reader task of `id` to its registry entry; it is aborted
    /// when the entry goes away. Aborts `reader` at once if `id` is unknown.
    pub fn attach_reader(&mut self, id: ConnId, reader: AbortHandle) {
        match self.clients.get_mut(&id) {
            Some(client) => client.reader = Some(reader),
            None => reader.abort(),
        }
    }

    pub fn assign(&mut self, id: ConnId, nick: &str) -> Result<(), NickError> {
        if nick.is_empty() {
            return Err(NickError::Empty);
        }

        let taken = self
            .clients
            .iter()
            .any(|(other, client)| *other != id && client.nick == nick);

        if taken {
            return Err(NickError::Taken(nick.to_string()));
        }

        let client = self
            .clients
            .get_mut(&id)
            .ok_or(NickError::UnknownConnection(id))?;

        client.nick = nick.to_string();

        Ok(())
    }

    /// Removes `id`. Calling it again for the same handle is a no-op.
    pub fn unregister(&mut self, id: ConnId) -> Option<Client> {
        self.clients.remove(&id)
    }

    pub fn lookup(&self, nick: &str) -> Option<ConnId> {
        if nick.is_empty() {
            return None;
        }

        self.clients
            .iter()
            .find(|(_, client)| client.nick == nick)
            .map(|(id, _)| *id)
    }

    pub fn active_nicknames(&self) -> Vec<String> {
        self.clients
            .values()
            .filter(|c| c.is_named())
            .map(|c| c.nick.clone())
            .collect()
    }

    pub fn get(&self, id: ConnId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Nickname of `id`; empty while the client has not picked one.
    pub fn nickname(&self, id: ConnId) -> Option<&str> {
        self.clients.get(&id).map(Client::nick)
    }

    pub fn contains(&self, id: ConnId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<ConnId> {
        self.clients.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConnId, &Client)> {
        self.clients.iter().map(|(id, client)| (*id, client))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn named_count(&self) -> usize {
        self.clients.values().filter(|c| c.is_named()).count()
    }
}
