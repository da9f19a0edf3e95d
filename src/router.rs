use tracing::debug;

use crate::registry::{ConnId, Registry};

/// Sends `text` to one connection, adding the line terminator.
pub fn unicast(registry: &Registry, id: ConnId, text: &str) {
    match registry.get(id) {
        Some(client) => {
            client.outbox().push(id, format!("{text}\n"));
        }
        None => debug!(conn = %id, "unicast to closed connection"),
    }
}

/// Sends `text` to every named connection except `exclude`.
pub fn broadcast(registry: &Registry, text: &str, exclude: Option<ConnId>) -> usize {
    let line = format!("{text}\n");
    let mut delivered = 0;

    for (id, client) in registry.iter() {
        if Some(id) == exclude || !client.is_named() {
            continue;
        }

        if client.outbox().push(id, line.clone()) {
            delivered += 1;
        }
    }

    debug!(recipients = delivered, "broadcast: {text}");

    delivered
}
