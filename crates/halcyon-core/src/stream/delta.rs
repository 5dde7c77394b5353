//! Chunk frame decoding.

use serde::Deserialize;

/// One decoded unit of streamed model output.
///
/// The reasoning channel is populated by providers that emit structured
/// `reasoning_content`; providers that interleave thinking via tag markers
/// deliver everything through `content` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDelta {
    pub reasoning: Option<String>,
    pub content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkFrame {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<FrameDelta>,
}

#[derive(Deserialize)]
struct FrameDelta {
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl StreamDelta {
    /// Decodes a raw transport chunk.
    ///
    /// A frame that fails to parse is not an error: the whole chunk is
    /// taken verbatim as content. A frame that parses but carries no delta
    /// decodes to an empty `StreamDelta`.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<ChunkFrame>(raw) {
            Ok(frame) => {
                let delta = frame.choices.into_iter().next().and_then(|c| c.delta);
                match delta {
                    Some(delta) => Self {
                        reasoning: delta.reasoning_content,
                        content: delta.content,
                    },
                    None => Self::default(),
                }
            }
            Err(_) => Self {
                reasoning: None,
                content: Some(raw.to_string()),
            },
        }
    }

    /// Creates a content-only delta.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            reasoning: None,
            content: Some(text.into()),
        }
    }

    /// Creates a reasoning-only delta.
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning: Some(text.into()),
            content: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_structured_frame() {
        let raw = r#"{"choices":[{"delta":{"content":"hello"}}]}"#;
        assert_eq!(StreamDelta::decode(raw), StreamDelta::content("hello"));
    }

    #[test]
    fn test_decode_reasoning_frame() {
        let raw = r#"{"choices":[{"delta":{"reasoning_content":"hmm","content":null}}]}"#;
        assert_eq!(StreamDelta::decode(raw), StreamDelta::reasoning("hmm"));
    }

    #[test]
    fn test_decode_both_channels() {
        let raw = r#"{"choices":[{"delta":{"reasoning_content":"hmm","content":"hi"}}]}"#;
        let delta = StreamDelta::decode(raw);
        assert_eq!(delta.reasoning.as_deref(), Some("hmm"));
        assert_eq!(delta.content.as_deref(), Some("hi"));
    }

    #[test]
    fn test_decode_falls_back_to_raw_text() {
        let delta = StreamDelta::decode("plain text chunk");
        assert_eq!(delta, StreamDelta::content("plain text chunk"));
    }

    #[test]
    fn test_decode_frame_without_delta_is_empty() {
        let delta = StreamDelta::decode(r#"{"choices":[]}"#);
        assert_eq!(delta, StreamDelta::default());
    }
}
