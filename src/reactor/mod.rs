//! Readiness polling and the OS socket layer.
//!
//! This module is responsible for:
//! - wrapping the raw socket syscalls the units need ([`platform`]),
//! - waiting for readiness on one or many sockets with a bounded timeout,
//! - translating OS readiness flags into [`Event`]s.
//!
//! Units never block here longer than their configured poll timeout,
//! which keeps every turn short enough for the scheduler to interleave
//! other units.

mod event;
mod poller;

pub(crate) mod platform;

pub(crate) use event::{Event, Interest};
pub(crate) use poller::{Poller, wait};
