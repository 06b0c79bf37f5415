//! # Strand
//!
//! **Strand** provides non-blocking TCP endpoints for the **Nebula**
//! ecosystem, shaped as message-driven units that a cooperative scheduler
//! resumes one turn at a time.
//!
//! Units never share sockets or memory. They talk exclusively through
//! messages: a directive tag plus a body of named fields.
//!
//! - A [`Listener`](net::Listener) owns a listening socket and every
//!   connection it accepts. Each accepted connection is registered under a
//!   [`ConnectionId`](message::ConnectionId) and announced to a handler
//!   with `handle_connection`; the handler answers with `respond`, `send`
//!   or `close`.
//! - A [`Dialer`](net::Dialer) owns one outbound socket, forwards what it
//!   receives in `handle_chunk` messages, and writes payloads sent to it.
//!
//! Every turn polls for readiness with a bounded timeout and then yields,
//! so no unit can starve the others.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strand::config::ListenerBuilder;
//! use strand::hive::Hive;
//! use strand::message::{Body, directive};
//! use std::time::Duration;
//!
//! let mut hive = Hive::new();
//! hive.spawn("handler", MyHandler::default());
//! let listener = hive.spawn("listener", ListenerBuilder::new("handler").build());
//!
//! hive.send_message(
//!     &listener,
//!     directive::START_LISTENING,
//!     Body::new().with("host", "127.0.0.1").with("port", 9000),
//! );
//!
//! loop {
//!     hive.tick();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`net`]: Listener and dialer units
//! - [`hive`]: The cooperative scheduler driving units
//! - [`message`]: Envelopes, bodies and identifiers
//! - [`config`]: Unit builders and connect options

mod reactor;

pub mod config;
pub mod error;
pub mod hive;
pub mod message;
pub mod net;

pub use error::{Error, Result};
