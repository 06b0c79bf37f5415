use crate::error::{Error, Result};
use crate::reactor::platform::{
    RawFd, domain_of, sys_accept, sys_bind, sys_close, sys_connect, sys_get_socket_error,
    sys_ipv6_is_necessary, sys_listen, sys_read, sys_send, sys_set_reuseaddr, sys_socket,
    sys_sockname,
};
use crate::reactor::{Interest, wait};

use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::trace;

/// An owned, non-blocking TCP socket.
///
/// The descriptor belongs to exactly one unit and is closed when the
/// `Socket` is dropped. Sockets are never handed to another unit: only
/// copies of the bytes read from them travel in messages.
#[derive(Debug)]
pub(crate) struct Socket {
    fd: RawFd,
}

impl Socket {
    /// Creates a listening socket bound to `address`.
    ///
    /// This function:
    /// - creates a non-blocking socket,
    /// - enables `SO_REUSEADDR`,
    /// - configures IPv6 dual-stack if applicable,
    /// - binds and starts listening with the given backlog.
    pub(crate) fn listen(address: &SocketAddr, backlog: i32) -> io::Result<Self> {
        let domain = domain_of(address);
        let socket = Self {
            fd: sys_socket(domain)?,
        };

        sys_set_reuseaddr(socket.fd)?;
        sys_ipv6_is_necessary(socket.fd, domain)?;
        sys_bind(socket.fd, address)?;
        sys_listen(socket.fd, backlog)?;

        Ok(socket)
    }

    /// Connects to `address`, waiting at most `timeout` for the handshake.
    ///
    /// `None` waits until the OS gives up. A signal interrupting the wait
    /// resumes it with whatever time is left. The returned socket is
    /// non-blocking.
    pub(crate) fn connect(address: &SocketAddr, timeout: Option<Duration>) -> io::Result<Self> {
        let socket = Self {
            fd: sys_socket(domain_of(address))?,
        };

        if sys_connect(socket.fd, address)? {
            return Ok(socket);
        }

        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));

            match wait(socket.fd, Interest::WRITE, remaining) {
                Ok(Some(_)) => {
                    sys_get_socket_error(socket.fd)?;
                    return Ok(socket);
                }
                Ok(None) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connection to {address} timed out"),
                    ));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    trace!(%address, "connect wait interrupted");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Accepts one pending connection.
    ///
    /// Returns `WouldBlock` when nothing is pending.
    pub(crate) fn accept(&self) -> io::Result<(Socket, SocketAddr)> {
        let (fd, peer) = sys_accept(self.fd)?;
        Ok((Socket { fd }, peer))
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }

    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        sys_sockname(self.fd)
    }

    /// Reads whatever is available, up to `buffer.len()` bytes.
    pub(crate) fn read(&self, buffer: &mut [u8]) -> io::Result<usize> {
        sys_read(self.fd, buffer)
    }

    /// Performs a single write and returns how many bytes the OS accepted.
    pub(crate) fn write(&self, buffer: &[u8]) -> io::Result<usize> {
        sys_send(self.fd, buffer)
    }

    /// Writes the entire buffer, resuming after partial writes.
    ///
    /// A full send buffer is not a failure: the call waits (in steps of
    /// `wait_step`) until the socket is writable again. With a `limit`,
    /// the total time spent waiting is bounded and running out fails with
    /// a `TimedOut` I/O error. A write that accepts zero bytes, a hangup,
    /// or any other OS error is reported as [`Error::ConnectionBroken`].
    ///
    /// Returns the number of bytes written, always `buffer.len()` on success.
    pub(crate) fn write_all(
        &self,
        buffer: &[u8],
        wait_step: Duration,
        limit: Option<Duration>,
    ) -> Result<usize> {
        let deadline = limit.map(|l| Instant::now() + l);
        let mut sent = 0;

        while sent < buffer.len() {
            match self.write(&buffer[sent..]) {
                Ok(0) => return Err(Error::ConnectionBroken),
                Ok(n) => {
                    sent += n;
                    trace!(fd = self.fd, sent, total = buffer.len(), "partial write");
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    self.wait_writable(wait_step, deadline)?;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    trace!(fd = self.fd, %err, "write rejected");
                    return Err(Error::ConnectionBroken);
                }
            }
        }

        Ok(sent)
    }

    fn wait_writable(&self, step: Duration, deadline: Option<Instant>) -> Result<()> {
        // A zero step would spin; poll with at least a millisecond.
        let step = step.max(Duration::from_millis(1));

        loop {
            let wait_for = match deadline {
                None => step,
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "socket stayed unwritable",
                        )
                        .into());
                    }
                    left.min(step)
                }
            };

            match wait(self.fd, Interest::WRITE, Some(wait_for)) {
                Ok(Some(event)) if event.writable => return Ok(()),
                Ok(Some(event)) if event.error || event.hangup => {
                    return Err(Error::ConnectionBroken);
                }
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl Drop for Socket {
    /// Closes the socket.
    fn drop(&mut self) {
        sys_close(self.fd);
    }
}
