//! `poll(2)`-based readiness poller.
//!
//! Units rebuild their registration set every turn (the set of open
//! sockets changes between turns), then issue a single bounded wait.
//! The wait timeout is the unit's cooperative latency bound: it is the
//! longest a turn can keep the scheduler before yielding.

use super::event::{Event, Interest};
use super::platform::{RawFd, sys_poll};

use libc::{POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT, POLLPRI, c_int, c_short, pollfd};
use std::io;
use std::time::Duration;

pub(crate) struct Poller {
    /// Descriptors in registration order.
    fds: Vec<pollfd>,

    /// Token of each entry in `fds`, same index.
    tokens: Vec<usize>,
}

impl Poller {
    pub(crate) fn new() -> Self {
        Self {
            fds: Vec::with_capacity(8),
            tokens: Vec::with_capacity(8),
        }
    }

    /// Register a file descriptor for this wait.
    pub(crate) fn register(&mut self, fd: RawFd, token: usize, interest: Interest) {
        let mut flags: c_short = 0;

        if interest.read {
            flags |= POLLIN;
        }
        if interest.priority {
            flags |= POLLPRI;
        }
        if interest.write {
            flags |= POLLOUT;
        }

        self.fds.push(pollfd {
            fd,
            events: flags,
            revents: 0,
        });
        self.tokens.push(token);
    }

    /// Drop every registration.
    pub(crate) fn clear(&mut self) {
        self.fds.clear();
        self.tokens.clear();
    }

    /// Poll for I/O readiness events.
    ///
    /// Blocks until:
    /// - at least one registered descriptor becomes ready,
    /// - or the optional timeout expires (`None` waits indefinitely).
    ///
    /// An interrupted wait reports no events.
    pub(crate) fn poll(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        match self.poll_interruptible(events, timeout) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(()),
            other => other,
        }
    }

    /// Same as [`poll`](Self::poll), but an interrupted wait is returned
    /// as an `Interrupted` error.
    fn poll_interruptible(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        events.clear();

        for fd in &mut self.fds {
            fd.revents = 0;
        }

        if sys_poll(&mut self.fds, timeout_ms(timeout))? == 0 {
            return Ok(());
        }

        for (fd, &token) in self.fds.iter().zip(&self.tokens) {
            let revents = fd.revents;
            if revents == 0 {
                continue;
            }

            events.push(Event {
                token,
                readable: revents & POLLIN != 0,
                priority: revents & POLLPRI != 0,
                writable: revents & POLLOUT != 0,
                hangup: revents & POLLHUP != 0,
                error: revents & (POLLERR | POLLNVAL) != 0,
            });
        }

        Ok(())
    }
}

/// Wait for a single descriptor.
///
/// Returns `None` when the timeout elapsed with nothing to report, and an
/// `Interrupted` error when a signal cut the wait short. Callers decide
/// whether to wait again and for how long.
pub(crate) fn wait(fd: RawFd, interest: Interest, timeout: Option<Duration>) -> io::Result<Option<Event>> {
    let mut poller = Poller::new();
    let mut events = Vec::with_capacity(1);

    poller.register(fd, 0, interest);
    poller.poll_interruptible(&mut events, timeout)?;

    Ok(events.pop())
}

/// Converts a timeout to poll(2) milliseconds.
///
/// Non-zero sub-millisecond timeouts are rounded up so they still wait.
fn timeout_ms(timeout: Option<Duration>) -> c_int {
    match timeout {
        None => -1,
        Some(t) if t.is_zero() => 0,
        Some(t) => {
            let ms = t.as_millis().max(1);
            ms.min(c_int::MAX as u128) as c_int
        }
    }
}
