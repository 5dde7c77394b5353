//! Per-message stream assembly.
//!
//! Bridges the chunk transport to the conversation store: each open stream
//! runs the tag-state parser over its message's buffers, and the end event
//! swaps the locally assembled preview for the server-authoritative final
//! content.

use std::collections::HashMap;
use std::sync::Arc;

use halcyon_core::message::ContentPart;
use halcyon_core::stream::{StreamDelta, StreamFinal, TagState};
use tokio::sync::RwLock;

use crate::signal::{SignalSender, UiSignal};
use crate::store::ConversationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamPhase {
    Streaming,
    Finalized,
}

/// Owns the transient streaming state of every in-flight message.
///
/// Guarantees: at most one open stream per message id, and exactly one
/// completion signal per message. Chunks arriving after finalization are
/// ignored rather than treated as errors, to tolerate duplicate or late
/// delivery.
pub struct StreamAssembler {
    store: Arc<ConversationStore>,
    phases: RwLock<HashMap<String, StreamPhase>>,
    signals: SignalSender,
}

impl StreamAssembler {
    pub fn new(store: Arc<ConversationStore>, signals: SignalSender) -> Self {
        Self {
            store,
            phases: RwLock::new(HashMap::new()),
            signals,
        }
    }

    /// Applies one raw transport chunk to its message.
    ///
    /// No-op when the message is unknown or the stream already finalized.
    pub async fn on_chunk(&self, message_id: &str, raw_chunk: &str) {
        {
            let phases = self.phases.read().await;
            if phases.get(message_id) == Some(&StreamPhase::Finalized) {
                tracing::debug!(
                    target: "chat_stream",
                    message_id,
                    "late chunk after finalization ignored"
                );
                return;
            }
        }

        let delta = StreamDelta::decode(raw_chunk);
        let applied = self
            .store
            .with_message_mut(message_id, |message| {
                let mut state = TagState {
                    is_thinking: message.is_thinking,
                    answer: std::mem::take(message.answer_text_mut()),
                    thinking: std::mem::take(&mut message.thinking_segments),
                };
                state.apply(&delta);
                *message.answer_text_mut() = state.answer;
                message.thinking_segments = state.thinking;
                message.is_thinking = state.is_thinking;
            })
            .await;

        if applied.is_none() {
            tracing::debug!(target: "chat_stream", message_id, "chunk for unknown message dropped");
            return;
        }

        let mut phases = self.phases.write().await;
        phases
            .entry(message_id.to_string())
            .or_insert(StreamPhase::Streaming);
    }

    /// Finalizes a stream with the server-authoritative payload.
    ///
    /// The first call per message id wins; repeats are ignored, and an end
    /// event for an unknown message does nothing. The local assembly is a
    /// live preview only - when the payload carries final content it
    /// replaces the message content wholesale.
    pub async fn on_end(&self, message_id: &str, final_payload: StreamFinal) {
        // Held across the store update so two racing end events cannot
        // both pass the duplicate check.
        let mut phases = self.phases.write().await;
        if phases.get(message_id) == Some(&StreamPhase::Finalized) {
            tracing::debug!(target: "chat_stream", message_id, "duplicate end event ignored");
            return;
        }

        let applied = self
            .store
            .with_message_mut(message_id, |message| {
                if let Some(content) = final_payload.content {
                    message.content = vec![ContentPart::text(content)];
                }
                message.sources = final_payload.sources;
                message.suggestions = final_payload.suggestions;
                message.error = final_payload.error;
                message.clear_stream_state();
            })
            .await;
        if applied.is_none() {
            tracing::debug!(
                target: "chat_stream",
                message_id,
                "end event for unknown message dropped"
            );
            return;
        }

        phases.insert(message_id.to_string(), StreamPhase::Finalized);
        drop(phases);

        self.signals.send(UiSignal::StreamFinished {
            message_id: message_id.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_core::message::Message;
    use tokio::sync::mpsc::error::TryRecvError;

    async fn setup() -> (
        StreamAssembler,
        Arc<ConversationStore>,
        tokio::sync::mpsc::UnboundedReceiver<UiSignal>,
        String,
    ) {
        let store = Arc::new(ConversationStore::new());
        let (signals, rx) = SignalSender::channel();
        let message = Message::assistant_placeholder("c-1");
        let message_id = message.id.clone();
        store.add_message(message).await;
        let assembler = StreamAssembler::new(Arc::clone(&store), signals);
        (assembler, store, rx, message_id)
    }

    fn answer_text(message: &Message) -> &str {
        match message.content.first() {
            Some(ContentPart::Text { text }) => text,
            _ => panic!("no text part"),
        }
    }

    #[tokio::test]
    async fn test_chunks_assemble_preview() {
        let (assembler, store, _rx, id) = setup().await;

        assembler.on_chunk(&id, "Hello <thi").await;
        assembler.on_chunk(&id, "nk>secret</think> world").await;

        let message = store.message(&id).await.unwrap();
        assert_eq!(answer_text(&message), "Hello  world");
        assert_eq!(message.thinking_segments, vec!["secret"]);
        assert!(!message.is_thinking);
    }

    #[tokio::test]
    async fn test_end_overwrites_preview_and_clears_transients() {
        let (assembler, store, mut rx, id) = setup().await;

        assembler.on_chunk(&id, "<think>draft").await;
        assembler
            .on_end(
                &id,
                StreamFinal {
                    content: Some("final answer".to_string()),
                    suggestions: Some(vec!["more?".to_string()]),
                    ..Default::default()
                },
            )
            .await;

        let message = store.message(&id).await.unwrap();
        assert_eq!(answer_text(&message), "final answer");
        assert!(message.thinking_segments.is_empty());
        assert!(!message.is_thinking);
        assert_eq!(message.suggestions, Some(vec!["more?".to_string()]));
        assert_eq!(
            rx.try_recv(),
            Ok(UiSignal::StreamFinished {
                message_id: id.clone()
            })
        );
    }

    #[tokio::test]
    async fn test_end_without_content_keeps_preview() {
        let (assembler, store, _rx, id) = setup().await;

        assembler.on_chunk(&id, "partial answer").await;
        assembler.on_end(&id, StreamFinal::default()).await;

        let message = store.message(&id).await.unwrap();
        assert_eq!(answer_text(&message), "partial answer");
    }

    #[tokio::test]
    async fn test_late_chunk_after_end_is_ignored() {
        let (assembler, store, _rx, id) = setup().await;

        assembler
            .on_end(
                &id,
                StreamFinal {
                    content: Some("done".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assembler.on_chunk(&id, "straggler").await;

        let message = store.message(&id).await.unwrap();
        assert_eq!(answer_text(&message), "done");
    }

    #[tokio::test]
    async fn test_duplicate_end_signals_once() {
        let (assembler, _store, mut rx, id) = setup().await;

        assembler.on_end(&id, StreamFinal::default()).await;
        assembler.on_end(&id, StreamFinal::default()).await;

        assert!(matches!(
            rx.try_recv(),
            Ok(UiSignal::StreamFinished { .. })
        ));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_unknown_message_is_noop() {
        let (assembler, _store, _rx, _id) = setup().await;
        // Must not panic or register a phase for the unknown id.
        assembler.on_chunk("missing", "text").await;
    }

    #[tokio::test]
    async fn test_end_for_unknown_message_emits_no_signal() {
        let (assembler, store, mut rx, id) = setup().await;

        assembler.on_end("missing", StreamFinal::default()).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        // The unknown id left no phase behind, so a real stream for a
        // known message is unaffected.
        assembler.on_chunk(&id, "still live").await;
        let message = store.message(&id).await.unwrap();
        assert_eq!(answer_text(&message), "still live");
    }
}
