//! TCP units.
//!
//! This module provides the two transport endpoints:
//! - [`Listener`]: binds, accepts connections and writes responses,
//! - [`Dialer`]: connects out and streams what it receives to a handler.
//!
//! Both are [`Actor`](crate::hive::Actor)s driven by a
//! [`Hive`](crate::hive::Hive). Sockets never leave the unit that opened
//! them; handlers only see copies of the bytes.

mod dialer;
mod listener;
mod socket;

pub use dialer::Dialer;
pub use listener::{DEFAULT_HOST, DEFAULT_PORT, Listener};
