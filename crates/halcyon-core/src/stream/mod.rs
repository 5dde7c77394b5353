//! Streaming content assembly primitives.
//!
//! The chat transport delivers partial model output as an ordered sequence
//! of chunk frames followed by exactly one end frame. This module holds the
//! pure pieces of that pipeline: decoding a raw chunk into a
//! [`StreamDelta`], and folding deltas into answer text and thinking
//! segments via [`TagState`]. The stateful per-message assembly lives in
//! the application layer.

mod delta;
mod tag;

pub use delta::StreamDelta;
pub use tag::TagState;

use serde::{Deserialize, Serialize};

use crate::message::KnowledgeSource;

/// Server-authoritative final payload delivered with the stream end event.
///
/// The locally assembled buffers are a live preview only; when `content`
/// is present it replaces them wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFinal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<KnowledgeSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
