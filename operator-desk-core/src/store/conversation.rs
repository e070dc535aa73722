//! In-memory conversation store

use super::message::{Message, Sender, UserId};
use std::collections::HashMap;

/// Owns the active set and every user's message history
///
/// Purely synchronous; callers serialize access (the relay engine keeps it
/// behind a single mutex). Every method either fully applies or does nothing.
#[derive(Debug, Default)]
pub struct ConversationStore {
    /// Engaged users in insertion order
    active: Vec<UserId>,
    /// Append-only histories
    histories: HashMap<UserId, Vec<Message>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` to the active set; returns whether it was newly added
    pub fn ensure_active(&mut self, id: &UserId) -> bool {
        if self.is_active(id) {
            return false;
        }
        self.active.push(id.clone());
        true
    }

    /// Append a message, creating the history on first use
    pub fn append_message(&mut self, id: &UserId, text: impl Into<String>, sender: Sender) -> Message {
        let message = Message::new(text, sender);
        self.histories
            .entry(id.clone())
            .or_default()
            .push(message.clone());
        message
    }

    /// Snapshot of a user's history; empty when unknown
    pub fn history(&self, id: &UserId) -> Vec<Message> {
        self.histories.get(id).cloned().unwrap_or_default()
    }

    /// Snapshot of the active set in insertion order
    pub fn list_active(&self) -> Vec<UserId> {
        self.active.clone()
    }

    pub fn is_active(&self, id: &UserId) -> bool {
        self.active.contains(id)
    }

    pub fn len_active(&self) -> usize {
        self.active.len()
    }

    /// Drop `id` from the active set and discard its history
    pub fn end_user(&mut self, id: &UserId) {
        self.active.retain(|active| active != id);
        self.histories.remove(id);
    }

    /// Empty the history in place; active membership is untouched
    pub fn clear_history(&mut self, id: &UserId) {
        self.histories.insert(id.clone(), Vec::new());
    }

    /// Re-key membership and history from `old` to `new`
    ///
    /// `new` takes `old`'s position in the active set. Rejects renaming onto
    /// another identifier that is already active or still holds messages.
    /// Renaming a user to itself changes nothing.
    pub fn rename_user(&mut self, old: &UserId, new: &UserId) -> crate::Result<()> {
        let position = self
            .active
            .iter()
            .position(|id| id == old)
            .ok_or_else(|| crate::Error::NotFound(format!("user {} is not active", old)))?;

        if old == new {
            return Ok(());
        }

        let target_has_messages = self.histories.get(new).is_some_and(|h| !h.is_empty());
        if self.is_active(new) || target_has_messages {
            return Err(crate::Error::Conflict(format!(
                "user {} already exists",
                new
            )));
        }

        self.active[position] = new.clone();
        let history = self.histories.remove(old).unwrap_or_default();
        self.histories.insert(new.clone(), history);
        Ok(())
    }
}
