use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::registry::ConnId;

/// Outbound line queue of one connection.
///
/// Sends never wait: if the writer is behind by a full queue, or already
/// gone, the line is dropped. Dropping the last `Outbox` lets the writer
/// flush what is queued and shut the socket down.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<String>,
}

impl Outbox {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        (Self { tx }, rx)
    }

    /// Queues an already terminated line. Returns whether it was queued.
    pub fn push(&self, id: ConnId, line: String) -> bool {
        match self.tx.try_send(line) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(conn = %id, "outbox full, dropping line");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(conn = %id, "writer gone, dropping line");
                false
            }
        }
    }
}

/// Drains `rx` into the socket until every `Outbox` handle is dropped or a
/// write fails. A write that makes no progress for `stall` gives up on the
/// peer, so a client that stops reading can not pin its socket open.
pub fn spawn_writer(
    id: ConnId,
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<String>,
    stall: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            match timeout(stall, writer.write_all(line.as_bytes())).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(conn = %id, "write failed: {err}");
                    return;
                }
                Err(_) => {
                    warn!(conn = %id, "write stalled for {stall:?}, dropping peer");
                    return;
                }
            }
        }

        let _ = timeout(stall, writer.shutdown()).await;
        debug!(conn = %id, "writer finished");
    })
}
