//! Task snapshot reconciliation.
//!
//! Each successful poll fully replaces the locally held [`AgentTask`]
//! snapshot. Reconciliation is the pure diff step in between: it decides
//! which in-flight section refinements have actually landed, whether the
//! task just reached a terminal status, and whether a final report should
//! be surfaced to the user.

use std::collections::HashSet;

use crate::task::AgentTask;

/// Result of diffing two consecutive task snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// In-flight refinement node ids whose content changed between the
    /// snapshots. The caller removes these from its in-flight set.
    pub resolved: HashSet<String>,
    /// The new snapshot carries a terminal status; polling must stop and
    /// the whole in-flight set is cleared unconditionally.
    pub terminal: bool,
    /// A non-empty final report should be surfaced to the display layer.
    pub reveal_report: bool,
}

/// Diffs `previous` against `next`.
///
/// A refinement is resolved iff the content node under its id differs
/// between the two snapshots; node ids outside `in_flight` are never
/// touched. With no previous snapshot there is nothing to compare and
/// nothing resolves.
///
/// A report is revealed only for a terminal status other than
/// `awaiting_user_input` (a paused task shows its plan, not a report).
pub fn reconcile(
    previous: Option<&AgentTask>,
    next: &AgentTask,
    in_flight: &HashSet<String>,
) -> ReconcileOutcome {
    let mut resolved = HashSet::new();

    if let Some(previous) = previous {
        for node_id in in_flight {
            if previous.content_node(node_id) != next.content_node(node_id) {
                resolved.insert(node_id.clone());
            }
        }
    }

    let terminal = next.status.is_terminal();
    let has_report = next
        .final_report
        .as_deref()
        .is_some_and(|report| !report.is_empty());
    let reveal_report = terminal
        && has_report
        && next.status != crate::task::TaskStatus::AwaitingUserInput;

    ReconcileOutcome {
        resolved,
        terminal,
        reveal_report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{AgentTask, ContentNode, TaskMode, TaskStatus};
    use std::collections::HashMap;

    fn task_with_content(status: TaskStatus, nodes: &[(&str, &str)]) -> AgentTask {
        let mut task = AgentTask::provisional("c-1", "goal", TaskMode::Research);
        task.id = "t-1".to_string();
        task.status = status;
        if !nodes.is_empty() {
            let content: HashMap<String, ContentNode> = nodes
                .iter()
                .map(|(id, text)| {
                    (
                        id.to_string(),
                        ContentNode {
                            current: text.to_string(),
                            history: None,
                        },
                    )
                })
                .collect();
            task.research_content = Some(content);
        }
        task
    }

    fn in_flight(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_resolves_iff_content_changed() {
        let previous = task_with_content(TaskStatus::Running, &[("1", "old"), ("2", "same")]);
        let next = task_with_content(TaskStatus::Running, &[("1", "new"), ("2", "same")]);

        let outcome = reconcile(Some(&previous), &next, &in_flight(&["1", "2"]));

        assert_eq!(outcome.resolved, in_flight(&["1"]));
        assert!(!outcome.terminal);
    }

    #[test]
    fn test_untouched_nodes_are_never_resolved() {
        let previous = task_with_content(TaskStatus::Running, &[("1", "old"), ("3", "x")]);
        let next = task_with_content(TaskStatus::Running, &[("1", "new"), ("3", "y")]);

        // "3" changed but is not in flight.
        let outcome = reconcile(Some(&previous), &next, &in_flight(&["1"]));
        assert_eq!(outcome.resolved, in_flight(&["1"]));
    }

    #[test]
    fn test_no_previous_snapshot_resolves_nothing() {
        let next = task_with_content(TaskStatus::Running, &[("1", "text")]);
        let outcome = reconcile(None, &next, &in_flight(&["1"]));
        assert!(outcome.resolved.is_empty());
    }

    #[test]
    fn test_node_appearing_in_next_resolves() {
        let previous = task_with_content(TaskStatus::Running, &[]);
        let next = task_with_content(TaskStatus::Running, &[("1", "fresh")]);

        let outcome = reconcile(Some(&previous), &next, &in_flight(&["1"]));
        assert_eq!(outcome.resolved, in_flight(&["1"]));
    }

    #[test]
    fn test_history_change_resolves() {
        let mut previous = task_with_content(TaskStatus::Running, &[("1", "same")]);
        let mut next = task_with_content(TaskStatus::Running, &[("1", "same")]);
        previous
            .research_content
            .as_mut()
            .unwrap()
            .get_mut("1")
            .unwrap()
            .history = None;
        next.research_content
            .as_mut()
            .unwrap()
            .get_mut("1")
            .unwrap()
            .history = Some(vec![crate::task::Refinement {
            prompt: "p".to_string(),
            content: "c".to_string(),
            timestamp: 1,
        }]);

        let outcome = reconcile(Some(&previous), &next, &in_flight(&["1"]));
        assert_eq!(outcome.resolved, in_flight(&["1"]));
    }

    #[test]
    fn test_completed_with_report_reveals() {
        let mut next = task_with_content(TaskStatus::Completed, &[]);
        next.final_report = Some("done".to_string());

        let outcome = reconcile(None, &next, &HashSet::new());
        assert!(outcome.terminal);
        assert!(outcome.reveal_report);
    }

    #[test]
    fn test_awaiting_user_input_suppresses_reveal() {
        let mut next = task_with_content(TaskStatus::AwaitingUserInput, &[]);
        next.final_report = Some("plan ready".to_string());

        let outcome = reconcile(None, &next, &HashSet::new());
        assert!(outcome.terminal);
        assert!(!outcome.reveal_report);
    }

    #[test]
    fn test_empty_report_is_not_revealed() {
        let mut next = task_with_content(TaskStatus::Failed, &[]);
        next.final_report = Some(String::new());

        let outcome = reconcile(None, &next, &HashSet::new());
        assert!(outcome.terminal);
        assert!(!outcome.reveal_report);
    }
}
