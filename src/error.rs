//! Error types shared by every unit in the crate.
//!
//! Errors fall in two groups:
//! - **fatal** errors ([`Error::ConnectionBroken`], [`Error::Io`]) terminate
//!   the loop of the unit that raised them,
//! - every other variant is reported to the caller and the unit keeps running.

use crate::message::{ActorId, ConnectionId};

use std::io;
use thiserror::Error;

/// Errors raised by listener and dialer units.
#[derive(Debug, Error)]
pub enum Error {
    /// A required message field is missing or malformed.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The connection id is not present in the listener's table.
    #[error("unknown correlation id {0}")]
    UnknownCorrelation(ConnectionId),

    /// The peer closed the connection or the socket rejected a write.
    #[error("socket connection broken")]
    ConnectionBroken,

    /// A write to an accepted connection failed; the entry has been evicted.
    #[error("peer of connection {0} disconnected")]
    PeerDisconnected(ConnectionId),

    /// An operation needs a socket that has not been connected yet.
    #[error("not connected")]
    NotConnected,

    /// The unit has no route for the directive it received.
    #[error("{actor} cannot handle directive `{directive}`")]
    UnknownDirective { actor: ActorId, directive: String },

    /// A message was addressed to a unit the hive does not know.
    #[error("unknown actor {0}")]
    UnknownActor(ActorId),

    /// Underlying OS error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns `true` when the error terminates the owning unit's loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ConnectionBroken | Error::Io(_))
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
