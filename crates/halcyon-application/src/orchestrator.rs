//! Agent task orchestration.
//!
//! Composes the poll scheduler and snapshot reconciler into the public
//! task operations: start, stop, restart, resume, section refinement, and
//! history reload. Every operation mutates the task's attached message in
//! place - the display layer observes that message and never needs a
//! second lookup - and every backend failure is absorbed into a local
//! state correction rather than propagated.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use halcyon_core::message::{ContentPart, Message};
use halcyon_core::reconcile::reconcile;
use halcyon_core::task::{AgentTask, OutlineStatus, TaskMode, find_node_mut};
use tokio::sync::RwLock;

use crate::backend::{AgentBackend, TaskControl, TaskLaunch};
use crate::config::PollConfig;
use crate::poll::{PollOutcome, PollScheduler};
use crate::signal::{SignalSender, UiSignal};
use crate::store::ConversationStore;

/// Report attached when the user stops a task by hand.
pub const MANUAL_STOP_REPORT: &str = "Task manually stopped by user.";
/// Report attached when a poll response cannot be parsed.
pub const PARSE_FAILURE_REPORT: &str = "Failed to parse task status from the server.";
/// Report attached when a poll returns nothing.
pub const FETCH_FAILURE_REPORT: &str = "Failed to retrieve task status from the server.";
/// Report attached when a history reload cannot parse a task snapshot.
pub const HISTORY_PARSE_REPORT: &str = "Error: Could not load final task state.";
/// Report attached when a history reload gets no task snapshot.
pub const HISTORY_FETCH_REPORT: &str = "Error: Could not retrieve final task state from server.";
/// Error shown on the placeholder when task creation fails.
pub const START_FAILURE_ERROR: &str =
    "Could not initiate agent task on the backend. Please check logs.";
/// Fallback content shown on the placeholder when task creation fails.
pub const START_FAILURE_TEXT: &str = "Agent task failed to start.";

/// Client-side owner of every in-flight agent task.
pub struct AgentTaskOrchestrator {
    store: Arc<ConversationStore>,
    backend: Arc<dyn AgentBackend>,
    scheduler: PollScheduler,
    /// Last snapshot per task id, the `previous` side of reconciliation.
    tasks: RwLock<HashMap<String, AgentTask>>,
    /// In-flight section refinements per task id.
    refinements: RwLock<HashMap<String, HashSet<String>>>,
    signals: SignalSender,
}

impl AgentTaskOrchestrator {
    pub fn new(
        store: Arc<ConversationStore>,
        backend: Arc<dyn AgentBackend>,
        config: PollConfig,
        signals: SignalSender,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            backend,
            scheduler: PollScheduler::new(config),
            tasks: RwLock::new(HashMap::new()),
            refinements: RwLock::new(HashMap::new()),
            signals,
        })
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// True while a poll timer exists for the task.
    pub async fn is_polling(&self, task_id: &str) -> bool {
        self.scheduler.is_active(task_id).await
    }

    /// The last snapshot observed for a task, if any.
    pub async fn snapshot(&self, task_id: &str) -> Option<AgentTask> {
        let tasks = self.tasks.read().await;
        tasks.get(task_id).cloned()
    }

    /// Section refinements still awaiting a changed snapshot.
    pub async fn in_flight_refinements(&self, task_id: &str) -> HashSet<String> {
        let refinements = self.refinements.read().await;
        refinements.get(task_id).cloned().unwrap_or_default()
    }

    /// Creates a task for an instruction and links it to the placeholder
    /// message already shown in the conversation.
    ///
    /// Never returns an error: a failed creation mutates the placeholder
    /// into an error-display state instead.
    pub async fn start_task(
        self: &Arc<Self>,
        conversation_id: &str,
        instruction: &str,
        placeholder_message_id: &str,
        model_override: Option<String>,
        knowledge_selection: &str,
        mode: TaskMode,
    ) {
        let launch = TaskLaunch {
            mode,
            knowledge_selection: knowledge_selection.to_string(),
            model_override,
        };

        let Some(task_id) = self
            .backend
            .create_task(conversation_id, instruction, &launch)
            .await
        else {
            tracing::warn!(
                target: "agent_task",
                conversation_id,
                "backend refused to create agent task"
            );
            self.store
                .with_message_mut(placeholder_message_id, |message| {
                    message.error = Some(START_FAILURE_ERROR.to_string());
                    message.model = None;
                    message.content = vec![ContentPart::text(START_FAILURE_TEXT)];
                })
                .await;
            return;
        };

        if let Err(err) = self
            .backend
            .link_task_to_message(placeholder_message_id, &task_id)
            .await
        {
            tracing::warn!(target: "agent_task", task_id, error = %err, "failed to persist task link");
        }

        let linked_id = task_id.clone();
        self.store
            .with_message_mut(placeholder_message_id, move |message| {
                message.agent_task_id = Some(linked_id.clone());
                if let Some(task) = message.agent_task.as_mut() {
                    task.id = linked_id;
                }
            })
            .await;

        tracing::info!(target: "agent_task", task_id, mode = ?mode, "agent task started");
        self.start_polling(&task_id).await;
    }

    /// Stops a task: the local status flips to failed with a fixed report
    /// before the backend ever answers, the stop command is
    /// fire-and-forget, and the poll timer goes away along with the
    /// task's poll bookkeeping.
    pub async fn stop_task(&self, task_id: &str) {
        self.signals.info(format!("Stopping task {task_id}..."));

        self.store
            .with_message_by_task_id_mut(task_id, |message| {
                if let Some(task) = message.agent_task.as_mut() {
                    task.fail_locally(MANUAL_STOP_REPORT);
                }
            })
            .await;
        self.clear_task_state(task_id).await;

        if let Err(err) = self
            .backend
            .send_control(TaskControl::Stop {
                task_id: task_id.to_string(),
            })
            .await
        {
            tracing::warn!(target: "agent_task", task_id, error = %err, "stop command failed");
        }
        self.scheduler.stop(task_id).await;
    }

    /// Restarts a failed task. The only allowed way out of a terminal
    /// status: the stale error bubble is removed, the status optimistically
    /// returns to running, and polling resumes against a clean snapshot
    /// history.
    pub async fn restart_task(self: &Arc<Self>, task_id: &str) {
        self.clear_task_state(task_id).await;
        self.store
            .with_message_by_task_id_mut(task_id, |message| {
                if let Some(task) = message.agent_task.as_mut() {
                    task.status = halcyon_core::task::TaskStatus::Running;
                }
            })
            .await;
        self.store.remove_trailing_error(task_id).await;

        self.signals.info("Attempting to resume task...");
        if let Err(err) = self
            .backend
            .send_control(TaskControl::Restart {
                task_id: task_id.to_string(),
            })
            .await
        {
            tracing::warn!(target: "agent_task", task_id, error = %err, "restart command failed");
        }
        self.start_polling(task_id).await;
    }

    /// Resumes a write task with the user-confirmed plan.
    ///
    /// Precondition (caller's responsibility): the task status is
    /// `awaiting_user_input`. The core does not re-check.
    pub async fn resume_with_plan(
        self: &Arc<Self>,
        task_id: &str,
        elaboration: serde_json::Value,
        plan: Vec<halcyon_core::task::OutlineNode>,
    ) {
        let attached_plan = plan.clone();
        self.store
            .with_message_by_task_id_mut(task_id, move |message| {
                if let Some(task) = message.agent_task.as_mut() {
                    task.status = halcyon_core::task::TaskStatus::Running;
                    task.plan = Some(attached_plan);
                }
            })
            .await;

        self.signals
            .info("Outline confirmed. Resuming writing process...");
        if let Err(err) = self
            .backend
            .send_control(TaskControl::Resume {
                task_id: task_id.to_string(),
                elaboration,
                plan,
            })
            .await
        {
            tracing::warn!(target: "agent_task", task_id, error = %err, "resume command failed");
        }
        self.start_polling(task_id).await;
    }

    /// Requests a re-generation of one outline section under a prompt and
    /// tracks it until a changed snapshot confirms it landed.
    pub async fn refine_section(
        self: &Arc<Self>,
        task_id: &str,
        node_id: &str,
        prompt: &str,
        model: &str,
    ) {
        self.signals.info(format!("Refining section {node_id}..."));
        self.track_refinement(task_id, node_id).await;

        if let Err(err) = self
            .backend
            .send_control(TaskControl::Refine {
                task_id: task_id.to_string(),
                node_id: node_id.to_string(),
                prompt: prompt.to_string(),
                model: model.to_string(),
            })
            .await
        {
            tracing::warn!(target: "agent_task", task_id, node_id, error = %err, "refine command failed");
        }
        self.start_polling(task_id).await;
    }

    /// Requests initial content for one outline section, flipping its
    /// outline status to writing immediately.
    pub async fn generate_section_content(self: &Arc<Self>, task_id: &str, node_id: &str) {
        let target = node_id.to_string();
        self.store
            .with_message_by_task_id_mut(task_id, move |message| {
                if let Some(plan) = message.agent_task.as_mut().and_then(|t| t.plan.as_mut()) {
                    if let Some(node) = find_node_mut(plan, &target) {
                        node.status = OutlineStatus::Writing;
                    }
                }
            })
            .await;

        self.signals
            .info(format!("Generating content for section {node_id}..."));
        self.track_refinement(task_id, node_id).await;

        if let Err(err) = self
            .backend
            .send_control(TaskControl::Generate {
                task_id: task_id.to_string(),
                node_id: node_id.to_string(),
            })
            .await
        {
            tracing::warn!(target: "agent_task", task_id, node_id, error = %err, "generate command failed");
        }
        self.start_polling(task_id).await;
    }

    /// Attaches current task snapshots to history messages in one shot.
    ///
    /// Fetches run in parallel; a missing or unparsable snapshot forces an
    /// existing attached task into a failed display state. Deliberately
    /// does not start polling - loading history has no side effects beyond
    /// display, and [`Self::resume_polling_for_active_tasks`] is the
    /// explicit follow-up step.
    pub async fn fetch_initial_task_states(&self, messages: &mut [Message]) {
        let targets: Vec<(usize, String)> = messages
            .iter()
            .enumerate()
            .filter_map(|(index, message)| {
                let task_id = message.agent_task_id.clone()?;
                message.is_agent_message().then_some((index, task_id))
            })
            .collect();
        if targets.is_empty() {
            return;
        }

        let fetches = targets
            .iter()
            .map(|(_, task_id)| self.backend.fetch_task_snapshot(task_id));
        let results = futures::future::join_all(fetches).await;

        for ((index, task_id), raw) in targets.into_iter().zip(results) {
            let message = &mut messages[index];
            match raw {
                Some(raw) => match serde_json::from_str::<AgentTask>(&raw) {
                    Ok(task) => message.agent_task = Some(task),
                    Err(err) => {
                        tracing::error!(
                            target: "agent_task",
                            task_id,
                            error = %err,
                            "failed to parse historical task snapshot"
                        );
                        if let Some(task) = message.agent_task.as_mut() {
                            task.fail_locally(HISTORY_PARSE_REPORT);
                        }
                    }
                },
                None => {
                    tracing::warn!(
                        target: "agent_task",
                        task_id,
                        "no snapshot for historical task"
                    );
                    if let Some(task) = message.agent_task.as_mut() {
                        task.fail_locally(HISTORY_FETCH_REPORT);
                    }
                }
            }
        }
    }

    /// Restarts polling for every attached task still in a pollable
    /// status. Called once after a bulk history load.
    pub async fn resume_polling_for_active_tasks(self: &Arc<Self>) {
        for task_id in self.store.active_task_ids().await {
            tracing::info!(target: "agent_poll", task_id, "resuming polling for active task");
            self.start_polling(&task_id).await;
        }
    }

    async fn start_polling(self: &Arc<Self>, task_id: &str) {
        let orchestrator = Arc::clone(self);
        self.scheduler
            .start(task_id, move |id| {
                let orchestrator = Arc::clone(&orchestrator);
                async move { orchestrator.poll_task(&id).await }
            })
            .await;
    }

    /// Drops the per-task poll bookkeeping: the in-flight refinement set
    /// and the last-snapshot cache.
    ///
    /// Runs whenever polling ends by any path other than a terminal
    /// snapshot (explicit stop, restart, or an unresolvable task message),
    /// so a later poll round starts with no previous snapshot to diff
    /// against.
    async fn clear_task_state(&self, task_id: &str) {
        self.refinements.write().await.remove(task_id);
        self.tasks.write().await.remove(task_id);
    }

    async fn track_refinement(&self, task_id: &str, node_id: &str) {
        let mut refinements = self.refinements.write().await;
        refinements
            .entry(task_id.to_string())
            .or_default()
            .insert(node_id.to_string());
    }

    /// One poll tick: fetch, parse, reconcile, replace.
    ///
    /// A null response and a parse failure are treated identically - the
    /// task is locally failed and polling ends without retry. The user
    /// brings it back with an explicit restart.
    async fn poll_task(&self, task_id: &str) -> PollOutcome {
        if self.store.find_message_by_task_id(task_id).await.is_none() {
            tracing::debug!(target: "agent_poll", task_id, "task message gone, stopping poll");
            self.clear_task_state(task_id).await;
            return PollOutcome::Stop;
        }

        let Some(raw) = self.backend.fetch_task_snapshot(task_id).await else {
            tracing::warn!(target: "agent_poll", task_id, "status fetch returned nothing");
            self.mark_task_failed(task_id, FETCH_FAILURE_REPORT).await;
            return PollOutcome::Stop;
        };

        let next: AgentTask = match serde_json::from_str(&raw) {
            Ok(task) => task,
            Err(err) => {
                tracing::warn!(target: "agent_poll", task_id, error = %err, "unparsable status payload");
                self.mark_task_failed(task_id, PARSE_FAILURE_REPORT).await;
                return PollOutcome::Stop;
            }
        };

        let outcome = {
            let tasks = self.tasks.read().await;
            let refinements = self.refinements.read().await;
            let no_refinements = HashSet::new();
            let in_flight = refinements.get(task_id).unwrap_or(&no_refinements);
            reconcile(tasks.get(task_id), &next, in_flight)
        };

        {
            let mut refinements = self.refinements.write().await;
            if outcome.terminal {
                refinements.remove(task_id);
            } else if let Some(in_flight) = refinements.get_mut(task_id) {
                for node_id in &outcome.resolved {
                    in_flight.remove(node_id);
                }
                if in_flight.is_empty() {
                    refinements.remove(task_id);
                }
            }
        }

        let status = next.status;
        {
            let mut tasks = self.tasks.write().await;
            tasks.insert(task_id.to_string(), next.clone());
        }
        self.store
            .with_message_by_task_id_mut(task_id, move |message| {
                if message.agent_task.is_some() {
                    message.agent_task = Some(next);
                }
            })
            .await;

        if outcome.reveal_report {
            self.signals.send(UiSignal::RevealResult {
                task_id: task_id.to_string(),
            });
        }

        if status.is_pollable() {
            PollOutcome::Continue
        } else {
            tracing::debug!(target: "agent_poll", task_id, status = ?status, "task reached terminal status");
            PollOutcome::Stop
        }
    }

    async fn mark_task_failed(&self, task_id: &str, report: &str) {
        self.store
            .with_message_by_task_id_mut(task_id, |message| {
                if let Some(task) = message.agent_task.as_mut() {
                    task.fail_locally(report);
                }
            })
            .await;
    }
}
