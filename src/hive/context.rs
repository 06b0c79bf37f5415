use crate::message::{ActorId, Body, Envelope, MessageId};

use std::collections::VecDeque;

/// Per-call view of the hive handed to a running unit.
///
/// Through the context a unit can send messages and request another
/// turn. Messages sent here are queued and delivered on a later tick,
/// never re-entrantly.
pub struct Context<'a> {
    id: &'a ActorId,
    outbox: &'a mut VecDeque<Envelope>,
    next_message: &'a mut u64,
    yielded: bool,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        id: &'a ActorId,
        outbox: &'a mut VecDeque<Envelope>,
        next_message: &'a mut u64,
    ) -> Self {
        Self {
            id,
            outbox,
            next_message,
            yielded: false,
        }
    }

    /// Id of the unit being run.
    pub fn id(&self) -> &ActorId {
        self.id
    }

    /// Sends a message and returns its freshly minted id.
    pub fn send_message(&mut self, to: &ActorId, directive: &str, body: Body) -> MessageId {
        self.push(to.clone(), directive, body, None)
    }

    /// Answers `envelope`, addressing its sender.
    ///
    /// Returns `None` when the envelope came from outside the hive and
    /// there is nobody to answer.
    pub fn reply(&mut self, envelope: &Envelope, directive: &str, body: Body) -> Option<MessageId> {
        let to = envelope.from()?.clone();
        Some(self.push(to, directive, body, Some(envelope.id())))
    }

    /// Yields back to the hive, asking to be resumed with another turn.
    ///
    /// This is the unit's yield point: whatever the unit does next happens
    /// in a later [`Actor::turn`](super::Actor::turn), after the hive had
    /// the chance to run other units and deliver other messages.
    pub fn yield_now(&mut self) {
        self.yielded = true;
    }

    pub(crate) fn yielded(&self) -> bool {
        self.yielded
    }

    fn push(
        &mut self,
        to: ActorId,
        directive: &str,
        body: Body,
        in_reply_to: Option<MessageId>,
    ) -> MessageId {
        let id = mint(self.next_message);

        self.outbox.push_back(Envelope::new(
            id,
            Some(self.id.clone()),
            to,
            directive,
            body,
            in_reply_to,
        ));

        id
    }
}

/// Mints the next message id from the hive counter.
pub(crate) fn mint(counter: &mut u64) -> MessageId {
    *counter += 1;
    MessageId::new(*counter)
}
