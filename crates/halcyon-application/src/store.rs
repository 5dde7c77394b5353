//! In-memory conversation store.
//!
//! Holds every loaded conversation's messages and offers the lookups the
//! streaming and polling paths need. Persistence is deliberately out of
//! scope; the host application syncs messages to its own storage.

use std::collections::HashMap;

use halcyon_core::message::{AGENT_RESULT_MARKER, Message};
use tokio::sync::RwLock;

/// Mutable registry of conversations keyed by conversation id.
///
/// All access goes through async methods; mutations run to completion
/// under the write lock, so the display layer never observes a message
/// half-updated.
#[derive(Default)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<String, Vec<Message>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to its conversation, creating the conversation
    /// entry on first use.
    pub async fn add_message(&self, message: Message) {
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message);
    }

    /// Replaces the message list of one conversation (bulk history load).
    pub async fn set_conversation(&self, conversation_id: impl Into<String>, messages: Vec<Message>) {
        let mut conversations = self.conversations.write().await;
        conversations.insert(conversation_id.into(), messages);
    }

    /// Returns a clone of one message for the display layer.
    pub async fn message(&self, message_id: &str) -> Option<Message> {
        let conversations = self.conversations.read().await;
        conversations
            .values()
            .flatten()
            .find(|m| m.id == message_id)
            .cloned()
    }

    /// Returns clones of one conversation's messages.
    pub async fn messages(&self, conversation_id: &str) -> Vec<Message> {
        let conversations = self.conversations.read().await;
        conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn contains_message(&self, message_id: &str) -> bool {
        let conversations = self.conversations.read().await;
        conversations.values().flatten().any(|m| m.id == message_id)
    }

    /// Runs `f` against the message with the given id.
    ///
    /// Returns `None` without calling `f` when the message is unknown.
    pub async fn with_message_mut<F, R>(&self, message_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut Message) -> R,
    {
        let mut conversations = self.conversations.write().await;
        let message = conversations
            .values_mut()
            .flatten()
            .find(|m| m.id == message_id)?;
        Some(f(message))
    }

    /// Runs `f` against the message that carries the given agent task id.
    pub async fn with_message_by_task_id_mut<F, R>(&self, task_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut Message) -> R,
    {
        let mut conversations = self.conversations.write().await;
        let message = conversations
            .values_mut()
            .flatten()
            .find(|m| m.agent_task_id.as_deref() == Some(task_id))?;
        Some(f(message))
    }

    /// Finds the id of the message carrying the given agent task id.
    pub async fn find_message_by_task_id(&self, task_id: &str) -> Option<String> {
        let conversations = self.conversations.read().await;
        conversations
            .values()
            .flatten()
            .find(|m| m.agent_task_id.as_deref() == Some(task_id))
            .map(|m| m.id.clone())
    }

    /// Removes the error-continuation message directly after the agent
    /// message for `task_id`, if present. Used before a restart so the
    /// stale failure bubble disappears.
    ///
    /// Returns true when a message was removed.
    pub async fn remove_trailing_error(&self, task_id: &str) -> bool {
        let mut conversations = self.conversations.write().await;
        for messages in conversations.values_mut() {
            let Some(index) = messages
                .iter()
                .position(|m| m.agent_task_id.as_deref() == Some(task_id) && m.is_agent_message())
            else {
                continue;
            };
            let Some(next) = messages.get(index + 1) else {
                continue;
            };
            if next.model.as_deref() == Some(AGENT_RESULT_MARKER)
                && next.agent_task_id.as_deref() == Some(task_id)
                && next.error.is_some()
            {
                messages.remove(index + 1);
                return true;
            }
        }
        false
    }

    /// Task ids of every attached task still in a pollable status.
    pub async fn active_task_ids(&self) -> Vec<String> {
        let conversations = self.conversations.read().await;
        conversations
            .values()
            .flatten()
            .filter_map(|m| {
                let task = m.agent_task.as_ref()?;
                let task_id = m.agent_task_id.as_deref()?;
                task.status.is_pollable().then(|| task_id.to_string())
            })
            .collect()
    }
}
