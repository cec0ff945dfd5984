//! Conversation-related types.

use shelf_agent_model::ModelMessage;

/// An append-only message history.
///
/// Messages can only be appended, the history never rewrites or drops what
/// it has already recorded.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    items: Vec<ModelMessage>,
}

impl Conversation {
    /// Appends a message.
    #[inline]
    pub fn push(&mut self, msg: ModelMessage) {
        self.items.push(msg);
    }

    /// Appends all messages in order.
    #[inline]
    pub fn extend<I: IntoIterator<Item = ModelMessage>>(&mut self, msgs: I) {
        self.items.extend(msgs);
    }

    /// Returns the recorded messages.
    #[inline]
    pub fn messages(&self) -> &[ModelMessage] {
        &self.items
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing has been recorded yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
