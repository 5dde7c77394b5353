//! Tag-based thinking/answer separation.
//!
//! Some providers wrap reasoning in `<think>`/`<thinking>` tag spans mixed
//! into the ordinary content stream. Because chunks can split a marker at
//! any byte offset, the state machine operates on the accumulated buffers
//! rather than on the raw per-chunk text: a partial marker simply fails to
//! match until a later chunk completes it.

use super::StreamDelta;

const OPENING_MARKERS: [&str; 2] = ["<think>", "<thinking>"];
const CLOSING_MARKERS: [&str; 2] = ["</think>", "</thinking>"];

/// Finds the earliest occurrence of any marker, returning its byte offset
/// and length.
fn earliest_marker(haystack: &str, markers: &[&str]) -> Option<(usize, usize)> {
    markers
        .iter()
        .filter_map(|marker| haystack.find(marker).map(|idx| (idx, marker.len())))
        .min_by_key(|&(idx, _)| idx)
}

/// Incremental parse state for one streaming message.
///
/// `answer` holds the visible answer text; `thinking` holds the ordered
/// reasoning segments. Both grow as deltas are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagState {
    pub is_thinking: bool,
    pub answer: String,
    pub thinking: Vec<String>,
}

impl TagState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one decoded delta.
    ///
    /// The structured reasoning channel is authoritative: it forces the
    /// thinking state and bypasses tag scanning for its own text. Content
    /// text then lands in the active buffer, and the accumulated buffers
    /// are re-scanned for state transitions until no marker remains.
    pub fn apply(&mut self, delta: &StreamDelta) {
        let reasoning = delta.reasoning.as_deref().filter(|r| !r.is_empty());

        if let Some(reasoning) = reasoning {
            self.is_thinking = true;
            self.current_thought().push_str(reasoning);
        }

        let Some(content) = delta.content.as_deref().filter(|c| !c.is_empty()) else {
            return;
        };

        // Content delivered alongside structured reasoning belongs to the
        // answer even while a thought is open.
        if self.is_thinking && reasoning.is_none() {
            self.current_thought().push_str(content);
        } else {
            self.answer.push_str(content);
        }

        self.scan_transitions();
    }

    /// Returns the open thinking segment, creating the first one on demand.
    fn current_thought(&mut self) -> &mut String {
        if self.thinking.is_empty() {
            self.thinking.push(String::new());
        }
        // Safe to unwrap: a segment was just pushed if none existed.
        self.thinking.last_mut().unwrap()
    }

    /// Re-scans the active buffer for tag markers until none match.
    ///
    /// Each match strictly shrinks the unscanned remainder, so the loop is
    /// bounded by the number of markers in the newly appended text; two
    /// adjacent empty spans terminate normally.
    fn scan_transitions(&mut self) {
        loop {
            if self.is_thinking {
                let Some(thought) = self.thinking.last_mut() else {
                    return;
                };
                let Some((idx, len)) = earliest_marker(thought, &CLOSING_MARKERS) else {
                    return;
                };
                let after = thought[idx + len..].to_string();
                thought.truncate(idx);
                self.answer.push_str(&after);
                self.is_thinking = false;
            } else {
                let Some((idx, len)) = earliest_marker(&self.answer, &OPENING_MARKERS) else {
                    return;
                };
                let after = self.answer[idx + len..].to_string();
                self.answer.truncate(idx);
                self.thinking.push(after);
                self.is_thinking = true;
            }
        }
    }
}
