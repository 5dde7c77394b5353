//! Conversation message types.
//!
//! This module contains types for representing messages in a conversation,
//! including roles, structured content parts, and the transient state a
//! message carries while a model response is still streaming into it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::{AgentTask, TaskMode};

/// Model marker for a message that hosts a long-running agent task.
pub const AGENT_MARKER: &str = "agent";
/// Model marker for a follow-up message produced from an agent task result.
pub const AGENT_RESULT_MARKER: &str = "agent-result";

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
}

/// A reference to an image carried inside a content part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One structured unit of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text content.
    Text { text: String },
    /// An image reference.
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    /// Creates a text content part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A source citation attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSource {
    pub id: String,
    pub file_path: String,
    pub source_name: String,
    pub content_snippet: String,
    pub score: f64,
}

/// A single message in a conversation.
///
/// Messages are the unit the display layer observes. A message that hosts
/// an agent task carries the full task state inline, so every poll update
/// is visible without a separate lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    /// Ordered content parts; the first text part is the answer buffer.
    pub content: Vec<ContentPart>,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<KnowledgeSource>>,
    /// Routing marker, e.g. a model identifier, [`AGENT_MARKER`] or
    /// [`AGENT_RESULT_MARKER`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_task: Option<AgentTask>,

    /// Transient: true while the open stream is inside a thinking span.
    /// Never persisted; cleared when the stream ends.
    #[serde(skip)]
    pub is_thinking: bool,
    /// Transient: reasoning segments assembled from the open stream.
    /// Never persisted; cleared when the stream ends.
    #[serde(skip)]
    pub thinking_segments: Vec<String>,
}

impl Message {
    /// Creates a user message with the given content parts.
    pub fn user(conversation_id: impl Into<String>, content: Vec<ContentPart>) -> Self {
        Self::new(conversation_id, MessageRole::User, content)
    }

    /// Creates an empty assistant message ready to receive a stream.
    pub fn assistant_placeholder(conversation_id: impl Into<String>) -> Self {
        Self::new(
            conversation_id,
            MessageRole::Assistant,
            vec![ContentPart::text("")],
        )
    }

    /// Creates an assistant message hosting a provisional agent task.
    ///
    /// The task carries a temporary id until the backend acknowledges
    /// creation and the real id is linked in.
    pub fn agent_placeholder(
        conversation_id: impl Into<String>,
        instruction: impl Into<String>,
        mode: TaskMode,
    ) -> Self {
        let conversation_id = conversation_id.into();
        let task = AgentTask::provisional(conversation_id.clone(), instruction, mode);
        let mut message = Self::new(conversation_id, MessageRole::Assistant, Vec::new());
        message.model = Some(AGENT_MARKER.to_string());
        message.agent_task = Some(task);
        message
    }

    fn new(
        conversation_id: impl Into<String>,
        role: MessageRole,
        content: Vec<ContentPart>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role,
            content,
            timestamp: chrono::Utc::now().timestamp_millis(),
            error: None,
            suggestions: None,
            sources: None,
            model: None,
            agent_task_id: None,
            agent_task: None,
            is_thinking: false,
            thinking_segments: Vec::new(),
        }
    }

    /// Returns the mutable answer buffer, inserting an empty text part at
    /// the front when the message has none yet.
    pub fn answer_text_mut(&mut self) -> &mut String {
        let needs_text = !matches!(self.content.first(), Some(ContentPart::Text { .. }));
        if needs_text {
            self.content.insert(0, ContentPart::text(""));
        }
        match self.content.first_mut() {
            Some(ContentPart::Text { text }) => text,
            // Unreachable: a text part was just inserted at index 0.
            _ => unreachable!("first content part is text"),
        }
    }

    /// Clears the transient stream-parsing state.
    pub fn clear_stream_state(&mut self) {
        self.is_thinking = false;
        self.thinking_segments.clear();
    }

    /// True when this message hosts an agent task placeholder.
    pub fn is_agent_message(&self) -> bool {
        self.model.as_deref() == Some(AGENT_MARKER)
    }
}
