use super::actor::{Actor, Unit};
use super::context::{Context, mint};
use crate::error::Error;
use crate::message::{ActorId, Body, Envelope, MessageId, directive, field};

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// A failure raised by a unit while handling a message or running a turn.
#[derive(Debug)]
pub struct Failure {
    /// The unit that failed.
    pub actor: ActorId,

    /// Directive being handled, or `None` when the failure happened in a turn.
    pub directive: Option<String>,

    pub error: Error,
}

/// Single-threaded cooperative scheduler.
///
/// The hive owns every unit, a mailbox of pending messages, and the
/// queue of units that yielded and want another turn. It is driven by
/// calling [`tick`](Self::tick) (or [`run_until`](Self::run_until)):
///
/// 1. every message queued before the tick is delivered, in order,
/// 2. every unit that yielded before the tick runs one turn.
///
/// Nothing runs in parallel. A unit whose handler or turn returns a
/// fatal error is stopped: it receives no further turns and messages
/// addressed to it are dropped.
///
/// # Examples
///
/// ```rust,ignore
/// let mut hive = Hive::new();
/// let listener = hive.spawn("listener", ListenerBuilder::new("handler").build());
///
/// hive.send_message(&listener, directive::START_LISTENING, Body::new().with("port", 9000));
/// hive.run_until(Duration::from_secs(1), |hive| hive.failures().is_empty());
/// ```
pub struct Hive {
    units: HashMap<ActorId, Box<dyn Unit>>,
    stopped: HashSet<ActorId>,

    /// Messages waiting for delivery.
    mailbox: VecDeque<Envelope>,

    /// Units that yielded and wait for their next turn.
    ready: VecDeque<ActorId>,

    next_message: u64,
    failures: Vec<Failure>,
}

impl Hive {
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
            stopped: HashSet::new(),
            mailbox: VecDeque::new(),
            ready: VecDeque::new(),
            next_message: 0,
            failures: Vec::new(),
        }
    }

    /// Registers a unit under `id`.
    ///
    /// # Panics
    ///
    /// Panics if a unit is already registered under the same id.
    pub fn spawn<A: Actor>(&mut self, id: impl Into<ActorId>, actor: A) -> ActorId {
        let id = id.into();
        assert!(!self.units.contains_key(&id), "actor {id} already spawned");

        self.units.insert(id.clone(), Box::new(actor));
        id
    }

    /// Queues a message from outside the hive.
    pub fn send_message(&mut self, to: &ActorId, directive: &str, body: Body) -> MessageId {
        self.inject(to, directive, body, None)
    }

    /// Queues a message from outside the hive answering message `in_reply_to`.
    pub fn reply_to(
        &mut self,
        in_reply_to: MessageId,
        to: &ActorId,
        directive: &str,
        body: Body,
    ) -> MessageId {
        self.inject(to, directive, body, Some(in_reply_to))
    }

    /// Runs one scheduling round.
    ///
    /// Returns `false` when there was nothing to do: no queued message and
    /// no unit waiting for a turn.
    pub fn tick(&mut self) -> bool {
        let mut progressed = false;

        for _ in 0..self.mailbox.len() {
            let Some(envelope) = self.mailbox.pop_front() else {
                break;
            };

            self.deliver(envelope);
            progressed = true;
        }

        let ready = std::mem::take(&mut self.ready);
        for id in ready {
            self.run_turn(id);
            progressed = true;
        }

        progressed
    }

    /// Ticks until `done` holds or `timeout` elapses.
    ///
    /// Returns whether `done` held. Stops early if the hive goes idle,
    /// since nothing could change after that.
    pub fn run_until(&mut self, timeout: Duration, mut done: impl FnMut(&Hive) -> bool) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if done(self) {
                return true;
            }

            if Instant::now() >= deadline || !self.tick() {
                return done(self);
            }
        }
    }

    /// Gives shared access to a unit of concrete type `A`.
    ///
    /// Returns `None` if no unit is registered under `id` or it is not an `A`.
    pub fn with_actor<A: Actor, R>(&self, id: &ActorId, f: impl FnOnce(&A) -> R) -> Option<R> {
        let unit = self.units.get(id)?;
        unit.as_any().downcast_ref::<A>().map(f)
    }

    /// Gives exclusive access to a unit of concrete type `A`.
    pub fn with_actor_mut<A: Actor, R>(
        &mut self,
        id: &ActorId,
        f: impl FnOnce(&mut A) -> R,
    ) -> Option<R> {
        let unit = self.units.get_mut(id)?;
        unit.as_any_mut().downcast_mut::<A>().map(f)
    }

    /// Failures recorded so far, oldest first.
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Removes and returns every recorded failure, oldest first.
    ///
    /// A long-running hive should drain failures periodically; they are
    /// kept until taken.
    pub fn take_failures(&mut self) -> Vec<Failure> {
        std::mem::take(&mut self.failures)
    }

    /// Returns `true` once a unit has been stopped by a fatal error.
    pub fn is_stopped(&self, id: &ActorId) -> bool {
        self.stopped.contains(id)
    }

    fn inject(
        &mut self,
        to: &ActorId,
        directive: &str,
        body: Body,
        in_reply_to: Option<MessageId>,
    ) -> MessageId {
        let id = mint(&mut self.next_message);

        self.mailbox.push_back(Envelope::new(
            id,
            None,
            to.clone(),
            directive,
            body,
            in_reply_to,
        ));

        id
    }

    fn deliver(&mut self, envelope: Envelope) {
        let to = envelope.to().clone();

        if self.stopped.contains(&to) {
            warn!(actor = %to, directive = envelope.directive(), "dropping message for stopped actor");
            return;
        }

        let Some(unit) = self.units.get_mut(&to) else {
            warn!(actor = %to, directive = envelope.directive(), "dropping message for unknown actor");
            self.failures.push(Failure {
                actor: to.clone(),
                directive: Some(envelope.directive().to_owned()),
                error: Error::UnknownActor(to),
            });
            return;
        };

        debug!(message = %envelope.id(), actor = %to, directive = envelope.directive(), "delivering");

        let mut ctx = Context::new(&to, &mut self.mailbox, &mut self.next_message);
        let result = unit.handle(&envelope, &mut ctx);
        let yielded = ctx.yielded();

        if yielded {
            self.schedule(&to);
        }

        if let Err(error) = result {
            self.fail(to, Some(&envelope), error);
        }
    }

    fn run_turn(&mut self, id: ActorId) {
        if self.stopped.contains(&id) {
            return;
        }

        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };

        let mut ctx = Context::new(&id, &mut self.mailbox, &mut self.next_message);
        let result = unit.turn(&mut ctx);
        let yielded = ctx.yielded();

        if yielded {
            self.schedule(&id);
        }

        if let Err(error) = result {
            self.fail(id, None, error);
        }
    }

    fn schedule(&mut self, id: &ActorId) {
        if !self.ready.contains(id) {
            self.ready.push_back(id.clone());
        }
    }

    fn fail(&mut self, actor: ActorId, envelope: Option<&Envelope>, error: Error) {
        if error.is_fatal() {
            error!(actor = %actor, %error, "actor stopped");

            self.ready.retain(|id| id != &actor);
            self.stopped.insert(actor.clone());
        } else {
            warn!(actor = %actor, %error, "message handling failed");

            // Report to the caller, but never answer an error with an error.
            if let Some(envelope) = envelope.filter(|e| e.directive() != directive::ERROR) {
                if let Some(from) = envelope.from() {
                    let id = mint(&mut self.next_message);
                    self.mailbox.push_back(Envelope::new(
                        id,
                        Some(actor.clone()),
                        from.clone(),
                        directive::ERROR,
                        Body::new().with(field::ERROR, error.to_string()),
                        Some(envelope.id()),
                    ));
                }
            }
        }

        self.failures.push(Failure {
            actor,
            directive: envelope.map(|e| e.directive().to_owned()),
            error,
        });
    }
}

impl Default for Hive {
    fn default() -> Self {
        Self::new()
    }
}
