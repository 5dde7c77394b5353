//! Client-side orchestration for streamed chat and long-running agent tasks.
//!
//! Two cooperating services sit on top of a shared [`store::ConversationStore`]:
//!
//! - [`assembler::StreamAssembler`] turns raw transport chunks into live
//!   message previews, separating visible answer text from thinking spans.
//! - [`orchestrator::AgentTaskOrchestrator`] drives agent tasks through
//!   creation, fixed-interval status polling, snapshot reconciliation, and
//!   user-initiated control commands.
//!
//! The host application supplies the transport by implementing
//! [`backend::AgentBackend`] and receives display notifications over the
//! [`signal::UiSignal`] channel.

pub mod assembler;
pub mod backend;
pub mod config;
pub mod orchestrator;
pub mod poll;
pub mod signal;
pub mod store;

pub use assembler::StreamAssembler;
pub use backend::{AgentBackend, TaskControl, TaskLaunch};
pub use config::PollConfig;
pub use orchestrator::AgentTaskOrchestrator;
pub use poll::{PollOutcome, PollScheduler};
pub use signal::{NoticeLevel, SignalSender, UiSignal};
pub use store::ConversationStore;
