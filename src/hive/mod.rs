//! Cooperative scheduling of message-driven units.
//!
//! A [`Hive`] owns a set of units implementing [`Actor`], delivers the
//! messages they send each other, and resumes units that yielded. Units
//! are resumed one at a time on the calling thread; a unit's state is
//! only ever touched by the unit itself.
//!
//! The listener and dialer only depend on the [`Actor`] / [`Context`]
//! interface: message delivery, message-id minting, and the
//! [`Context::yield_now`] yield point.

mod actor;
mod context;
mod core;

pub use actor::Actor;
pub use context::Context;
pub use self::core::{Failure, Hive};
