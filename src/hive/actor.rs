use super::context::Context;
use crate::error::Result;
use crate::message::Envelope;

use std::any::Any;

/// A message-driven unit scheduled by a [`Hive`](super::Hive).
///
/// The hive calls [`handle`](Actor::handle) once per delivered message and
/// [`turn`](Actor::turn) once per scheduling turn the unit asked for with
/// [`Context::yield_now`]. Both run to completion: a unit is only ever
/// suspended between two calls, so its state needs no locking.
///
/// Returning an error that [`is_fatal`](crate::Error::is_fatal) stops the
/// unit for good.
pub trait Actor: 'static {
    /// Handles one delivered message.
    fn handle(&mut self, envelope: &Envelope, ctx: &mut Context<'_>) -> Result<()>;

    /// Runs one iteration of the unit's loop.
    ///
    /// Called only after the unit yielded. Units without a loop keep the
    /// default, which does nothing.
    fn turn(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}

/// Object-safe view of an [`Actor`] that can be downcast back to its
/// concrete type.
pub(crate) trait Unit: Actor {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<A: Actor> Unit for A {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
