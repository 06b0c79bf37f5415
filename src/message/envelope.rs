use super::body::Body;
use super::id::{ActorId, MessageId};

/// An immutable message travelling between units.
///
/// Envelopes are built by the hive when a unit sends a message; the
/// receiving unit only ever reads them.
#[derive(Debug, Clone)]
pub struct Envelope {
    id: MessageId,
    from: Option<ActorId>,
    to: ActorId,
    directive: String,
    body: Body,
    in_reply_to: Option<MessageId>,
}

impl Envelope {
    pub(crate) fn new(
        id: MessageId,
        from: Option<ActorId>,
        to: ActorId,
        directive: impl Into<String>,
        body: Body,
        in_reply_to: Option<MessageId>,
    ) -> Self {
        Self {
            id,
            from,
            to,
            directive: directive.into(),
            body,
            in_reply_to,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// The sending unit, or `None` for messages injected from outside the hive.
    pub fn from(&self) -> Option<&ActorId> {
        self.from.as_ref()
    }

    pub fn to(&self) -> &ActorId {
        &self.to
    }

    pub fn directive(&self) -> &str {
        &self.directive
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Id of the message this one answers, if any.
    pub fn in_reply_to(&self) -> Option<MessageId> {
        self.in_reply_to
    }
}
