/// I/O interest registered for a file descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Interest {
    /// Normal input is available.
    pub(crate) read: bool,

    /// Priority (out-of-band) input is available.
    pub(crate) priority: bool,

    /// Output buffer space is available.
    pub(crate) write: bool,
}

impl Interest {
    pub(crate) const READ: Interest = Interest {
        read: true,
        priority: false,
        write: false,
    };

    /// Normal and priority input, as watched by the dialer.
    pub(crate) const INPUT: Interest = Interest {
        read: true,
        priority: true,
        write: false,
    };

    pub(crate) const WRITE: Interest = Interest {
        read: false,
        priority: false,
        write: true,
    };
}

/// An I/O event reported by the poller.
///
/// An `Event` represents readiness information for a registered
/// file descriptor. Hangup and error conditions are always reported,
/// whatever interest was registered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Event {
    /// Token the descriptor was registered with.
    pub(crate) token: usize,

    pub(crate) readable: bool,
    pub(crate) priority: bool,
    pub(crate) writable: bool,

    /// The peer hung up.
    pub(crate) hangup: bool,

    /// An error condition is pending on the socket.
    pub(crate) error: bool,
}

impl Event {
    /// Returns `true` when a read would not block.
    ///
    /// A hangup counts as input: the read that follows returns the
    /// end-of-stream marker.
    pub(crate) fn has_input(&self) -> bool {
        self.readable || self.priority || self.hangup
    }
}
