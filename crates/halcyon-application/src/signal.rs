//! Signals exposed to the display layer.
//!
//! The orchestration core never talks to UI code directly; it publishes
//! [`UiSignal`] values on an unbounded channel and the display layer
//! renders them however it likes. Sends are non-blocking and a dropped
//! receiver is fine (headless operation, e.g. in tests).

use serde::Serialize;
use tokio::sync::mpsc;

/// Severity of a transient user notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Events the display layer reacts to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiSignal {
    /// A terminal task produced a final report worth surfacing.
    RevealResult { task_id: String },
    /// A chat stream finished and the message content is authoritative.
    StreamFinished { message_id: String },
    /// A transient user-facing notice (toast).
    Notice { level: NoticeLevel, text: String },
}

/// Cloneable sending half of the signal channel.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<UiSignal>,
}

impl SignalSender {
    /// Creates a connected sender/receiver pair.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publishes a signal. If the receiver is gone the signal is dropped.
    pub fn send(&self, signal: UiSignal) {
        let _ = self.tx.send(signal);
    }

    /// Publishes an informational notice.
    pub fn info(&self, text: impl Into<String>) {
        self.send(UiSignal::Notice {
            level: NoticeLevel::Info,
            text: text.into(),
        });
    }

    /// Publishes an error notice.
    pub fn error(&self, text: impl Into<String>) {
        self.send(UiSignal::Notice {
            level: NoticeLevel::Error,
            text: text.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signals_arrive_in_order() {
        let (sender, mut rx) = SignalSender::channel();
        sender.info("one");
        sender.send(UiSignal::RevealResult {
            task_id: "t-1".to_string(),
        });

        assert_eq!(
            rx.recv().await,
            Some(UiSignal::Notice {
                level: NoticeLevel::Info,
                text: "one".to_string()
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(UiSignal::RevealResult {
                task_id: "t-1".to_string()
            })
        );
    }

    #[test]
    fn test_send_without_receiver_is_silent() {
        let (sender, rx) = SignalSender::channel();
        drop(rx);
        sender.error("nobody listening");
    }
}
