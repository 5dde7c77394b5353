//! Agent task types.
//!
//! An [`AgentTask`] represents one long-running instruction executed by the
//! backend and observed from the client through repeated status polls. The
//! full snapshot is replaced on every successful poll, so these types mirror
//! the backend wire format exactly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The operating mode an agent task was started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    Plan,
    Explore,
    Write,
    Research,
    Debate,
}

/// The lifecycle status of an agent task.
///
/// Transitions are driven by fetched snapshots, except for the explicit
/// user-initiated `restart` (failed -> running) and `resume-with-plan`
/// (awaiting_user_input -> running).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// The backend is still building a plan.
    Planning,
    /// The task is actively executing.
    Running,
    /// The task finished successfully.
    Completed,
    /// The task failed, either remotely or by local decision.
    Failed,
    /// The task paused and is waiting for the user to confirm a plan.
    AwaitingUserInput,
}

impl TaskStatus {
    /// True when no further automatic polling should occur.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::AwaitingUserInput
        )
    }

    /// True while the steady poll loop should keep running.
    pub fn is_pollable(&self) -> bool {
        matches!(self, Self::Planning | Self::Running)
    }
}

/// Execution status of a single plan/outline unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlineStatus {
    Pending,
    Writing,
    Completed,
}

/// One addressable unit of a hierarchical task plan.
///
/// Nodes are identified by a dotted path (e.g. `"1.2.3"`); `steps` holds
/// the children, establishing the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub id: String,
    pub sub_goal: String,
    pub status: OutlineStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<OutlineNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
}

/// One recorded refinement of a content node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refinement {
    pub prompt: String,
    pub content: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Current generated text for one outline node plus its refinement history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    pub current: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<Refinement>>,
}

/// Execution status of one agent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One executed (or scheduled) step of an agent task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStep {
    pub id: String,
    pub task_id: String,
    pub step_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    pub action: String,
    pub action_input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// Temporary task id used before the backend acknowledges creation.
pub const PROVISIONAL_TASK_ID: &str = "temp-id";

/// One long-running agent instruction and its full observed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTask {
    pub id: String,
    pub conversation_id: String,
    pub user_goal: String,
    pub status: TaskStatus,
    pub mode: TaskMode,
    /// Epoch milliseconds.
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub steps: Vec<TaskStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<OutlineNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_report: Option<String>,
    /// Generated section content keyed by outline node id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_content: Option<HashMap<String, ContentNode>>,
}

impl AgentTask {
    /// Creates a provisional task attached to a placeholder message while
    /// backend creation is in flight.
    pub fn provisional(
        conversation_id: impl Into<String>,
        user_goal: impl Into<String>,
        mode: TaskMode,
    ) -> Self {
        Self {
            id: PROVISIONAL_TASK_ID.to_string(),
            conversation_id: conversation_id.into(),
            user_goal: user_goal.into(),
            status: TaskStatus::Planning,
            mode,
            created_at: chrono::Utc::now().timestamp_millis(),
            updated_at: None,
            steps: Vec::new(),
            plan: None,
            final_report: None,
            research_content: None,
        }
    }

    /// Looks up the content node for an outline node id, if any.
    pub fn content_node(&self, node_id: &str) -> Option<&ContentNode> {
        self.research_content.as_ref()?.get(node_id)
    }

    /// Marks the task as locally failed with the given report.
    pub fn fail_locally(&mut self, report: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.final_report = Some(report.into());
    }
}

/// Finds an outline node by id via depth-first traversal.
///
/// Dotted-path ids are opaque here; the tree is searched rather than the
/// path decoded, since snapshots may renumber nodes between polls.
pub fn find_node_mut<'a>(
    nodes: &'a mut [OutlineNode],
    node_id: &str,
) -> Option<&'a mut OutlineNode> {
    for node in nodes {
        if node.id == node_id {
            return Some(node);
        }
        if let Some(children) = node.steps.as_mut() {
            if let Some(found) = find_node_mut(children, node_id) {
                return Some(found);
            }
        }
    }
    None
}
