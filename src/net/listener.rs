use super::socket::Socket;
use crate::config::ListenerBuilder;
use crate::error::{Error, Result};
use crate::hive::{Actor, Context};
use crate::message::{ActorId, Body, ConnectionId, Envelope, directive, field};
use crate::reactor::{Event, Interest, Poller};

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Host bound when `start_listening` carries no `host`.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port bound when `start_listening` carries no `port`.
pub const DEFAULT_PORT: u16 = 8000;

/// Reserved poller token of the listening socket.
///
/// Connection tokens are indexes into the per-turn watch list and never
/// reach this value.
const LISTENER_TOKEN: usize = usize::MAX;

/// An accepted connection owned by the listener.
struct Connection {
    socket: Socket,
    peer: SocketAddr,

    /// Cleared once the peer finished sending or reading failed.
    read_open: bool,
}

/// TCP server unit.
///
/// Once started, every turn of the listener:
/// 1. polls the listening socket (and, when forwarding is enabled, every
///    open connection) with the configured poll timeout,
/// 2. accepts **at most one** pending connection, registers it under a
///    fresh [`ConnectionId`] and sends `handle_connection` to the handler,
/// 3. forwards bytes received on open connections as `handle_chunk`,
/// 4. yields.
///
/// Accepted sockets stay owned by the listener. The handler refers to
/// them by connection id through `respond`, `send` and `close`.
pub struct Listener {
    handler: ActorId,
    backlog: i32,
    poll_timeout: Duration,
    forward_reads: bool,

    /// Bound on the time a single `respond` or `send` may wait for the peer.
    write_timeout: Duration,

    /// Listening socket, present once started.
    socket: Option<Socket>,

    /// Correlation table: one entry per live accepted connection.
    connections: HashMap<ConnectionId, Connection>,
    next_connection: u64,

    poller: Poller,
    events: Vec<Event>,

    /// Connection watched under each poller token for the current turn.
    watched: Vec<ConnectionId>,

    buffer: Vec<u8>,
}

impl Listener {
    pub(crate) fn new(config: ListenerBuilder) -> Self {
        Self {
            handler: config.handler,
            backlog: config.backlog,
            poll_timeout: config.poll_timeout,
            forward_reads: config.forward_reads,
            write_timeout: config.write_timeout,
            socket: None,
            connections: HashMap::new(),
            next_connection: 0,
            poller: Poller::new(),
            events: Vec::with_capacity(16),
            watched: Vec::new(),
            buffer: vec![0; config.chunk_size],
        }
    }

    /// Binds to `(host, port)` and starts listening.
    ///
    /// The socket is non-blocking, has `SO_REUSEADDR` set and uses the
    /// configured backlog. The accept loop itself runs in
    /// [`turn`](Actor::turn).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArguments`] if the listener is already started,
    /// - [`Error::Io`] if the address cannot be resolved or bound.
    pub fn start_listening(&mut self, host: &str, port: u16) -> Result<SocketAddr> {
        if self.socket.is_some() {
            return Err(Error::InvalidArguments("listener is already listening".into()));
        }

        let address = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{host}:{port} did not resolve"),
            )
        })?;

        let socket = Socket::listen(&address, self.backlog)?;
        let local = socket.local_addr()?;
        self.socket = Some(socket);

        info!(%local, backlog = self.backlog, "listening");

        Ok(local)
    }

    /// Writes `response` to connection `id`, then closes it and removes it
    /// from the table.
    ///
    /// A peer that stops reading holds the write for at most the
    /// configured write timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownCorrelation`] if `id` is not in the table,
    /// - [`Error::PeerDisconnected`] if the write failed or timed out. The
    ///   entry is removed and the socket closed in that case too.
    pub fn respond(&mut self, id: ConnectionId, response: &[u8]) -> Result<()> {
        debug!(connection = %id, len = response.len(), "responding");

        let connection = self
            .connections
            .remove(&id)
            .ok_or(Error::UnknownCorrelation(id))?;

        connection
            .socket
            .write_all(response, self.poll_timeout, Some(self.write_timeout))
            .map_err(|err| {
                debug!(connection = %id, %err, "response write failed");
                Error::PeerDisconnected(id)
            })?;

        info!(connection = %id, peer = %connection.peer, "responded");

        Ok(())
    }

    /// Writes `data` to connection `id`, keeping it open and registered.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownCorrelation`] if `id` is not in the table,
    /// - [`Error::PeerDisconnected`] if the write failed or timed out; the
    ///   dead entry is removed.
    pub fn send(&mut self, id: ConnectionId, data: &[u8]) -> Result<()> {
        let connection = self
            .connections
            .get(&id)
            .ok_or(Error::UnknownCorrelation(id))?;

        if let Err(err) = connection
            .socket
            .write_all(data, self.poll_timeout, Some(self.write_timeout))
        {
            debug!(connection = %id, %err, "send failed");
            self.connections.remove(&id);
            return Err(Error::PeerDisconnected(id));
        }

        debug!(connection = %id, len = data.len(), "sent");

        Ok(())
    }

    /// Closes connection `id` without writing and removes it from the table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCorrelation`] if `id` is not in the table.
    pub fn close(&mut self, id: ConnectionId) -> Result<()> {
        let connection = self
            .connections
            .remove(&id)
            .ok_or(Error::UnknownCorrelation(id))?;

        info!(connection = %id, peer = %connection.peer, "closed");

        Ok(())
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn is_listening(&self) -> bool {
        self.socket.is_some()
    }

    /// Number of live entries in the correlation table.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn peer_addr(&self, id: ConnectionId) -> Option<SocketAddr> {
        self.connections.get(&id).map(|c| c.peer)
    }

    /// One iteration of the accept loop.
    fn poll_once(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let Some(listen_fd) = self.socket.as_ref().map(Socket::fd) else {
            return Ok(());
        };

        self.poller.clear();
        self.watched.clear();

        self.poller.register(listen_fd, LISTENER_TOKEN, Interest::READ);

        if self.forward_reads {
            for (id, connection) in &self.connections {
                if connection.read_open {
                    self.poller
                        .register(connection.socket.fd(), self.watched.len(), Interest::READ);
                    self.watched.push(*id);
                }
            }
        }

        self.poller.poll(&mut self.events, Some(self.poll_timeout))?;

        let events = std::mem::take(&mut self.events);

        for event in &events {
            if event.token == LISTENER_TOKEN {
                if event.readable {
                    self.accept_one(ctx);
                }
            } else if let Some(&id) = self.watched.get(event.token) {
                self.forward(id, event, ctx);
            }
        }

        self.events = events;

        Ok(())
    }

    fn accept_one(&mut self, ctx: &mut Context<'_>) {
        let Some(listening) = self.socket.as_ref() else {
            return;
        };

        let (socket, peer) = match listening.accept() {
            Ok(accepted) => accepted,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
            Err(err) => {
                warn!(%err, "accept failed");
                return;
            }
        };

        self.next_connection += 1;
        let id = ConnectionId::new(self.next_connection);

        self.connections.insert(
            id,
            Connection {
                socket,
                peer,
                read_open: true,
            },
        );

        info!(connection = %id, %peer, live = self.connections.len(), "accepted connection");

        ctx.send_message(
            &self.handler,
            directive::HANDLE_CONNECTION,
            Body::new()
                .with(field::CONNECTION, id)
                .with(field::PEER, peer),
        );

        debug!(connection = %id, handler = %self.handler, "sent connection to handler");
    }

    fn forward(&mut self, id: ConnectionId, event: &Event, ctx: &mut Context<'_>) {
        if !event.has_input() && !event.error {
            return;
        }

        let Some(connection) = self.connections.get_mut(&id) else {
            return;
        };

        match connection.socket.read(&mut self.buffer) {
            Ok(0) => {
                connection.read_open = false;
                debug!(connection = %id, "peer finished sending");

                ctx.send_message(
                    &self.handler,
                    directive::CONNECTION_CLOSED,
                    Body::new().with(field::CONNECTION, id),
                );
            }
            Ok(n) => {
                debug!(connection = %id, len = n, "forwarding chunk");

                ctx.send_message(
                    &self.handler,
                    directive::HANDLE_CHUNK,
                    Body::new()
                        .with(field::CONNECTION, id)
                        .with(field::CHUNK, &self.buffer[..n]),
                );
            }
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                connection.read_open = false;
                warn!(connection = %id, %err, "read failed");

                ctx.send_message(
                    &self.handler,
                    directive::CONNECTION_CLOSED,
                    Body::new().with(field::CONNECTION, id),
                );
            }
        }
    }
}

impl Actor for Listener {
    fn handle(&mut self, envelope: &Envelope, ctx: &mut Context<'_>) -> Result<()> {
        let body = envelope.body();

        match envelope.directive() {
            directive::START_LISTENING => {
                let host = body.str(field::HOST).unwrap_or(DEFAULT_HOST);
                let port = if body.contains(field::PORT) {
                    body.require_port(field::PORT)?
                } else {
                    DEFAULT_PORT
                };

                self.start_listening(host, port)?;
                ctx.yield_now();

                Ok(())
            }

            directive::RESPOND => self.respond(
                body.require_connection(field::CONNECTION)?,
                body.require_bytes(field::RESPONSE)?,
            ),

            directive::SEND => self.send(
                body.require_connection(field::CONNECTION)?,
                body.require_bytes(field::RESPONSE)?,
            ),

            directive::CLOSE => self.close(body.require_connection(field::CONNECTION)?),

            other => Err(Error::UnknownDirective {
                actor: ctx.id().clone(),
                directive: other.to_owned(),
            }),
        }
    }

    /// Runs one accept-loop iteration, then yields.
    fn turn(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        self.poll_once(ctx)?;
        ctx.yield_now();

        Ok(())
    }
}
