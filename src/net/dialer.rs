use super::socket::Socket;
use crate::config::{ConnectOptions, DEFAULT_CHUNK_SIZE, DialerBuilder};
use crate::error::{Error, Result};
use crate::hive::{Actor, Context};
use crate::message::{ActorId, Body, Envelope, directive, field};
use crate::reactor::{Event, Interest, Poller};

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Token of the dialer's only socket.
const SOCKET_TOKEN: usize = 0;

/// TCP client unit.
///
/// The dialer relies on another unit to process what it receives: once
/// connected, every turn waits up to the poll timeout for input, reads at
/// most `chunk_size` bytes, and sends them to the handler:
///
/// ```rust,ignore
/// ctx.send_message(&handler, "handle_chunk", Body::new().with("chunk", bytes));
/// ```
///
/// An empty read means the peer closed the connection; the dialer then
/// fails with [`Error::ConnectionBroken`], which stops it.
pub struct Dialer {
    handler: ActorId,
    poll_timeout: Duration,

    /// Outbound socket, present once connected.
    socket: Option<Socket>,
    peer: Option<SocketAddr>,

    poller: Poller,
    events: Vec<Event>,
    buffer: Vec<u8>,
}

impl Dialer {
    pub(crate) fn new(config: DialerBuilder) -> Self {
        Self {
            handler: config.handler,
            poll_timeout: config.poll_timeout,
            socket: None,
            peer: None,
            poller: Poller::new(),
            events: Vec::with_capacity(1),
            buffer: vec![0; DEFAULT_CHUNK_SIZE],
        }
    }

    /// Connects to the server described by `options`.
    ///
    /// Every address `host` resolves to is tried in turn, each bounded by
    /// `options.timeout`. The receive loop itself runs in
    /// [`turn`](Actor::turn).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArguments`] if the dialer is already connected,
    /// - [`Error::Io`] if no address could be reached.
    pub fn connect(&mut self, options: &ConnectOptions) -> Result<SocketAddr> {
        if self.socket.is_some() {
            return Err(Error::InvalidArguments("dialer is already connected".into()));
        }

        let mut last_error = None;

        for address in (options.host.as_str(), options.port).to_socket_addrs()? {
            match Socket::connect(&address, options.timeout) {
                Ok(socket) => {
                    self.socket = Some(socket);
                    self.peer = Some(address);
                    self.buffer = vec![0; options.chunk_size];

                    info!(host = %options.host, port = options.port, %address, "connected");

                    return Ok(address);
                }
                Err(err) => {
                    debug!(%address, %err, "connect attempt failed");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("{}:{} did not resolve", options.host, options.port),
                )
            })
            .into())
    }

    /// Writes the whole payload to the socket.
    ///
    /// Partial writes are resumed until every byte was accepted by the OS.
    /// A full send buffer makes the call wait for writability; it is not
    /// treated as a failure.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] before [`connect`](Self::connect),
    /// - [`Error::ConnectionBroken`] if a write accepts zero bytes or the
    ///   OS rejects it. The socket is dropped.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;

        match socket.write_all(payload, self.poll_timeout, None) {
            Ok(sent) => {
                debug!(len = sent, "sent");
                Ok(())
            }
            Err(err) => {
                self.disconnect();
                Err(err)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Address of the server, once connected.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// One iteration of the receive loop.
    fn poll_once(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let Some(fd) = self.socket.as_ref().map(Socket::fd) else {
            return Ok(());
        };

        self.poller.clear();
        self.poller.register(fd, SOCKET_TOKEN, Interest::INPUT);
        self.poller.poll(&mut self.events, Some(self.poll_timeout))?;

        let Some(event) = self.events.pop() else {
            return Ok(());
        };

        if !event.has_input() {
            if event.error {
                self.disconnect();
                return Err(Error::ConnectionBroken);
            }
            return Ok(());
        }

        self.receive(ctx)
    }

    fn receive(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let Some(socket) = self.socket.as_ref() else {
            return Ok(());
        };

        let n = match socket.read(&mut self.buffer) {
            Ok(n) => n,
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::Interrupted =>
            {
                return Ok(());
            }
            Err(err) => {
                debug!(%err, "read failed");
                self.disconnect();
                return Err(Error::ConnectionBroken);
            }
        };

        if n == 0 {
            self.disconnect();
            return Err(Error::ConnectionBroken);
        }

        trace!(len = n, handler = %self.handler, "forwarding chunk");

        ctx.send_message(
            &self.handler,
            directive::HANDLE_CHUNK,
            Body::new().with(field::CHUNK, &self.buffer[..n]),
        );

        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(peer) = self.peer.take() {
            info!(%peer, "connection broken");
        }
        self.socket = None;
    }
}

impl Actor for Dialer {
    fn handle(&mut self, envelope: &Envelope, ctx: &mut Context<'_>) -> Result<()> {
        let body = envelope.body();

        match envelope.directive() {
            directive::CONNECT => {
                let options = ConnectOptions::from_body(body)?;

                self.connect(&options)?;
                ctx.yield_now();

                Ok(())
            }

            directive::SEND => self.send(body.require_bytes(field::MESSAGE)?),

            other => Err(Error::UnknownDirective {
                actor: ctx.id().clone(),
                directive: other.to_owned(),
            }),
        }
    }

    /// Runs one receive-loop iteration, then yields.
    fn turn(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        self.poll_once(ctx)?;
        ctx.yield_now();

        Ok(())
    }
}
