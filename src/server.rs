use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::conn::{self, Flow, Limits};
use crate::outbox::{self, Outbox};
use crate::registry::{ConnId, Registry};

const EVENT_QUEUE: usize = 1024;

/// Input observed by a connection's reader task.
#[derive(Debug)]
enum Event {
    Line(ConnId, String),
    Closed(ConnId, Option<String>),
}

/// The chat server: one listening socket and the event loop that owns
/// every client's state.
pub struct Server {
    config: Config,
    listener: TcpListener,
    registry: Registry,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
}

impl Server {
    pub async fn bind(config: Config) -> Result<Self> {
        let addr = config.listen_addr();

        let socket = TcpSocket::new_v4().context("failed to create server socket")?;
        socket.set_reuseaddr(true)?;
        socket
            .bind(addr.into())
            .with_context(|| format!("failed to bind {addr}"))?;
        let listener = socket
            .listen(config.backlog)
            .with_context(|| format!("failed to listen on {addr}"))?;

        info!("listening on {}", listener.local_addr()?);

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);

        Ok(Self {
            config,
            listener,
            registry: Registry::new(),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serves clients until `shutdown` resolves, then closes every
    /// connection.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let limits = Limits::from(&self.config);
        let mut tick = time::interval(self.config.tick());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("chat server started and awaiting connections");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => self.accept(socket, peer),
                    Err(err) => warn!("failed to accept connection: {err}"),
                },

                Some(event) = self.events_rx.recv() => match event {
                    Event::Line(id, line) => {
                        if conn::handle_line(&mut self.registry, id, &line, limits) == Flow::Close {
                            self.close(id);
                        }
                    }
                    Event::Closed(id, reason) => {
                        if let Some(reason) = reason {
                            warn!(conn = %id, "read failed: {reason}");
                        }
                        self.close(id);
                    }
                },

                _ = tick.tick() => {
                    debug!(
                        connections = self.registry.len(),
                        named = self.registry.named_count(),
                        "housekeeping"
                    );
                }

                _ = &mut shutdown => break,
            }
        }

        let ids = self.registry.ids();
        info!(connections = ids.len(), "shutting down");
        for id in ids {
            self.registry.unregister(id);
        }

        Ok(())
    }

    fn accept(&mut self, socket: TcpStream, peer: SocketAddr) {
        if let Err(err) = socket.set_nodelay(true) {
            debug!(peer = %peer, "set_nodelay failed: {err}");
        }

        let (reader, writer) = socket.into_split();
        let (outbox, rx) = Outbox::new(self.config.outbox_capacity);

        let id = self.registry.register(outbox);
        outbox::spawn_writer(id, writer, rx, self.config.write_timeout());

        let reader = tokio::spawn(read_lines(
            id,
            reader,
            self.config.max_line_len,
            self.events_tx.clone(),
        ));
        self.registry.attach_reader(id, reader.abort_handle());

        info!(conn = %id, peer = %peer, "new client connected");

        conn::greet(&self.registry, id);
    }

    /// Drops `id` from the registry, which also stops its reader and lets
    /// its writer flush and shut the socket.
    fn close(&mut self, id: ConnId) {
        conn::disconnect(&mut self.registry, id);
    }
}

async fn read_lines(id: ConnId, reader: OwnedReadHalf, max_len: usize, events: mpsc::Sender<Event>) {
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(max_len));

    loop {
        let event = match lines.next().await {
            Some(Ok(line)) => Event::Line(id, line),
            Some(Err(err)) => Event::Closed(id, Some(err.to_string())),
            None => Event::Closed(id, None),
        };

        let last = matches!(event, Event::Closed(..));
        if events.send(event).await.is_err() || last {
            return;
        }
    }
}
