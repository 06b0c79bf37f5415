//! Unit configuration.
//!
//! Long-lived settings (handler, backlog, poll timeout) are fixed when a
//! unit is built through [`ListenerBuilder`] or [`DialerBuilder`].
//! Per-connection settings travel in the `connect` message body and are
//! parsed into [`ConnectOptions`].

use crate::error::{Error, Result};
use crate::message::{ActorId, Body, field};
use crate::net::{Dialer, Listener};

use std::time::Duration;

/// Default listen backlog.
pub const DEFAULT_BACKLOG: i32 = 5;

/// Default receive chunk size, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Largest accepted receive chunk size, in bytes.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Default dialer poll timeout.
pub const DEFAULT_DIALER_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Default bound on how long the listener waits for a peer to drain its
/// receive buffer during `respond` or `send`.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Builder for a [`Listener`] unit.
///
/// # Examples
///
/// ```rust,ignore
/// let listener = ListenerBuilder::new("request_handler")
///     .backlog(16)
///     .poll_timeout(Duration::from_millis(1))
///     .build();
/// ```
pub struct ListenerBuilder {
    pub(crate) handler: ActorId,
    pub(crate) backlog: i32,
    pub(crate) poll_timeout: Duration,
    pub(crate) chunk_size: usize,
    pub(crate) forward_reads: bool,
    pub(crate) write_timeout: Duration,
}

impl ListenerBuilder {
    /// Creates a builder delivering accepted connections to `handler`.
    ///
    /// Defaults: backlog of 5, zero poll timeout (the accept loop never
    /// waits, it yields every turn), 1024-byte read chunks, inbound data
    /// forwarding enabled, and a 500 ms write timeout.
    pub fn new(handler: impl Into<ActorId>) -> Self {
        Self {
            handler: handler.into(),
            backlog: DEFAULT_BACKLOG,
            poll_timeout: Duration::ZERO,
            chunk_size: DEFAULT_CHUNK_SIZE,
            forward_reads: true,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Sets the listen backlog.
    ///
    /// # Panics
    ///
    /// Panics if `backlog <= 0`.
    pub fn backlog(mut self, backlog: i32) -> Self {
        assert!(backlog > 0, "backlog must be > 0");

        self.backlog = backlog;
        self
    }

    /// Sets the longest a single turn waits for readiness.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Sets the maximum size of forwarded inbound chunks.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or above [`MAX_CHUNK_SIZE`].
    pub fn chunk_size(mut self, size: usize) -> Self {
        assert!(size > 0, "chunk_size must be > 0");
        assert!(size <= MAX_CHUNK_SIZE, "chunk_size must be <= {MAX_CHUNK_SIZE}");

        self.chunk_size = size;
        self
    }

    /// Enables or disables forwarding of bytes received on accepted
    /// connections as `handle_chunk` messages.
    pub fn forward_reads(mut self, enabled: bool) -> Self {
        self.forward_reads = enabled;
        self
    }

    /// Sets the longest `respond` or `send` may wait for a peer that does
    /// not read. Running out evicts the connection.
    ///
    /// The hive is held for the whole wait, so keep it short.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn build(self) -> Listener {
        Listener::new(self)
    }
}

/// Builder for a [`Dialer`] unit.
pub struct DialerBuilder {
    pub(crate) handler: ActorId,
    pub(crate) poll_timeout: Duration,
}

impl DialerBuilder {
    /// Creates a builder delivering received chunks to `handler`.
    ///
    /// The poll timeout defaults to 10 ms.
    pub fn new(handler: impl Into<ActorId>) -> Self {
        Self {
            handler: handler.into(),
            poll_timeout: DEFAULT_DIALER_POLL_TIMEOUT,
        }
    }

    /// Sets the longest a single turn waits for incoming data.
    ///
    /// This is also the dialer's worst-case yield latency.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn build(self) -> Dialer {
        Dialer::new(self)
    }
}

/// Options of a `connect` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,

    /// Connect timeout; `None` waits as long as the OS does.
    pub timeout: Option<Duration>,

    /// Maximum number of bytes read per turn.
    pub chunk_size: usize,
}

impl ConnectOptions {
    /// Parses options from a `connect` body.
    ///
    /// `host` and `port` are required; `timeout` (duration or whole
    /// seconds) and `chunk_size` are optional.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArguments`] if a required field is missing
    /// or a field holds an unusable value.
    pub fn from_body(body: &Body) -> Result<Self> {
        if !body.contains(field::HOST) || !body.contains(field::PORT) {
            return Err(Error::InvalidArguments(
                "connect must be called with `host` and `port` in the message body".into(),
            ));
        }

        let host = body.require_str(field::HOST)?.to_owned();
        let port = body.require_port(field::PORT)?;

        let timeout = match body.get(field::TIMEOUT) {
            None => None,
            Some(_) => Some(body.duration(field::TIMEOUT).ok_or_else(|| {
                Error::InvalidArguments("`timeout` must be a non-negative duration".into())
            })?),
        };

        let chunk_size = match body.get(field::CHUNK_SIZE) {
            None => DEFAULT_CHUNK_SIZE,
            Some(_) => body
                .int(field::CHUNK_SIZE)
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| (1..=MAX_CHUNK_SIZE).contains(n))
                .ok_or_else(|| {
                    Error::InvalidArguments(format!(
                        "`chunk_size` must be an integer between 1 and {MAX_CHUNK_SIZE}"
                    ))
                })?,
        };

        Ok(Self {
            host,
            port,
            timeout,
            chunk_size,
        })
    }
}
