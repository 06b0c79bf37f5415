//! Message model shared by all units.
//!
//! Units never share sockets or memory; everything they exchange travels
//! inside an [`Envelope`]: a directive tag naming the operation, and a
//! [`Body`] of named fields. Byte payloads are always copied into the body.
//!
//! Directive and field names are part of the contract between units and
//! are exposed as constants in [`directive`] and [`field`].

mod body;
mod envelope;
mod id;

pub use body::{Body, Value};
pub use envelope::Envelope;
pub use id::{ActorId, ConnectionId, MessageId};

/// Directive tags understood or emitted by the units in this crate.
pub mod directive {
    /// caller -> listener: bind and begin the accept loop.
    pub const START_LISTENING: &str = "start_listening";
    /// listener -> handler: a new connection was accepted.
    pub const HANDLE_CONNECTION: &str = "handle_connection";
    /// caller -> listener: write the response, then close.
    pub const RESPOND: &str = "respond";
    /// caller -> listener or dialer: write only.
    pub const SEND: &str = "send";
    /// caller -> listener: close the connection.
    pub const CLOSE: &str = "close";
    /// caller -> dialer: establish the outbound connection.
    pub const CONNECT: &str = "connect";
    /// listener or dialer -> handler: bytes received from a peer.
    pub const HANDLE_CHUNK: &str = "handle_chunk";
    /// listener -> handler: the peer finished sending on a connection.
    pub const CONNECTION_CLOSED: &str = "connection_closed";
    /// hive -> sender: handling of a message failed.
    pub const ERROR: &str = "error";
}

/// Body field names.
pub mod field {
    pub const HOST: &str = "host";
    pub const PORT: &str = "port";
    pub const TIMEOUT: &str = "timeout";
    pub const CHUNK_SIZE: &str = "chunk_size";
    pub const CONNECTION: &str = "connection";
    pub const PEER: &str = "peer";
    pub const RESPONSE: &str = "response";
    pub const MESSAGE: &str = "message";
    pub const CHUNK: &str = "chunk";
    pub const ERROR: &str = "error";
}
