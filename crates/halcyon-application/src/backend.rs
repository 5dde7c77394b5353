//! Backend seam.
//!
//! Everything the orchestration core needs from the host application is
//! captured in [`AgentBackend`]; the desktop shell implements it over IPC,
//! tests implement it with in-memory mocks. A `None` from `create_task` or
//! `fetch_task_snapshot` means "unreachable or refused" - the core treats
//! that as a soft failure, never as a panic.

use async_trait::async_trait;
use halcyon_core::Result;
use halcyon_core::task::{OutlineNode, TaskMode};
use serde::Serialize;

/// Parameters for launching a new agent task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLaunch {
    pub mode: TaskMode,
    /// Knowledge-base selection identifier (`"none"`, `"all"`, or a path).
    pub knowledge_selection: String,
    /// Optional `provider::model` override for this task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,
}

/// A control command for a running (or stopped) agent task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskControl {
    Stop {
        task_id: String,
    },
    Restart {
        task_id: String,
    },
    /// Resume a paused write task with a confirmed plan.
    Resume {
        task_id: String,
        elaboration: serde_json::Value,
        plan: Vec<OutlineNode>,
    },
    /// Re-generate one outline section under a user prompt.
    Refine {
        task_id: String,
        node_id: String,
        prompt: String,
        model: String,
    },
    /// Generate initial content for one outline section.
    Generate {
        task_id: String,
        node_id: String,
    },
}

impl TaskControl {
    /// The task this control command targets.
    pub fn task_id(&self) -> &str {
        match self {
            Self::Stop { task_id }
            | Self::Restart { task_id }
            | Self::Resume { task_id, .. }
            | Self::Refine { task_id, .. }
            | Self::Generate { task_id, .. } => task_id,
        }
    }
}

/// The long-running-task backend as seen from the client core.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Creates a task for an instruction. Fails soft: `None` when the
    /// backend is unreachable or rejects the request.
    async fn create_task(
        &self,
        conversation_id: &str,
        instruction: &str,
        launch: &TaskLaunch,
    ) -> Option<String>;

    /// Fetches the current serialized task snapshot. `None` and an
    /// unparsable payload are equivalent to the caller.
    async fn fetch_task_snapshot(&self, task_id: &str) -> Option<String>;

    /// Sends a control command. Fire-and-forget with respect to local
    /// state; failures are logged, not retried.
    async fn send_control(&self, control: TaskControl) -> Result<()>;

    /// Persists the task-to-message association.
    async fn link_task_to_message(&self, message_id: &str, task_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_task_id() {
        let control = TaskControl::Refine {
            task_id: "t-1".to_string(),
            node_id: "1.2".to_string(),
            prompt: "shorter".to_string(),
            model: "p::m".to_string(),
        };
        assert_eq!(control.task_id(), "t-1");
    }

    #[test]
    fn test_control_wire_format() {
        let control = TaskControl::Stop {
            task_id: "t-1".to_string(),
        };
        let json = serde_json::to_value(&control).unwrap();
        assert_eq!(json["kind"], "stop");
        assert_eq!(json["task_id"], "t-1");
    }
}
