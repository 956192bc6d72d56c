//! Execution controller: drives execute → parse → transition → advance.
//!
//! The controller ties the codec and the tree store to an external
//! [`Worker`]. Worker failures never propagate: unparsable output, schema
//! violations, wrong task ids and outright worker errors all downgrade to a
//! synthesized incomplete result carrying a fixed malformed marker, so the
//! state machine always has something valid to persist.

use crate::error::ManagerError;
use crate::format::{self, TaskFormat};
use crate::models::{
    Decomposition, ExecutionRecord, ExecutionResult, Subtask, SubtaskSpec, TaskStatus,
};
use crate::store::{StateScope, TaskTreeStore};
use serde::Serialize;
use std::sync::Arc;
use subtask_manager_sdk::{
    log_execute_finish, log_execute_start, log_result_malformed, log_subtask_added,
    log_subtask_decomposed, log_subtask_skipped, StateStore, Worker, WorkerRequest,
    WorkerResponse,
};

/// Returned to the planner when no subtask is addressable.
pub const NO_ACTIVE_SUBTASKS_MSG: &str =
    "No active subtasks. Use add_subtask to add a new subtask.";

/// Summary marker written into synthesized results for malformed worker
/// output. Also returned as the `error` flag of the execution outcome.
pub const TASK_RESULT_MALFORMED_MSG: &str =
    "Task result is malformed. Report task_id, status, output and summary in the configured format.";

/// Fixed summary for records produced by `skip`.
pub const SKIPPED_SUMMARY: &str = "Task skipped.";

/// Guidance handed back when an incomplete task blocks the pointer.
pub fn requires_decomposition_msg(task_id: &str) -> String {
    format!("Task {task_id} is incomplete and must be decomposed before advancing.")
}

fn advanced_msg(task_id: &str) -> String {
    format!("Advanced to subtask {task_id}.")
}

/// Configuration shared by one manager instance.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Manager name; part of the composite state key.
    pub name: String,
    /// Ceiling on the subtask sequence length.
    pub max_tasks: usize,
    /// Wire format used both to render requests and to bias result parsing.
    pub format: TaskFormat,
    /// Whether the skip operation is exposed on the tool surface.
    pub use_skip: bool,
    /// Wrap textual payloads in a labeled fence so the worker can
    /// self-identify the encoding.
    pub type_hint: bool,
}

impl ManagerConfig {
    pub fn new(name: impl Into<String>, max_tasks: usize) -> Self {
        Self {
            name: name.into(),
            max_tasks,
            format: TaskFormat::Json,
            use_skip: false,
            type_hint: false,
        }
    }

    pub fn with_format(mut self, format: TaskFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_skip(mut self, use_skip: bool) -> Self {
        self.use_skip = use_skip;
        self
    }

    pub fn with_type_hint(mut self, type_hint: bool) -> Self {
        self.type_hint = type_hint;
        self
    }
}

/// Outcome of one `execute_current_subtask` call.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    /// Merged subtask + result snapshot, as persisted to the audit log.
    pub record: ExecutionRecord,
    /// What the planner should do next.
    pub action: String,
    /// Set when the worker's output was downgraded to a synthesized result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The orchestrating state machine.
///
/// All state lives in the caller-owned [`StateStore`]; the manager itself
/// holds only configuration and the worker handle, so one instance can serve
/// any number of stores sequentially.
pub struct TaskManager {
    config: ManagerConfig,
    worker: Arc<dyn Worker>,
    tasks: TaskTreeStore,
}

impl TaskManager {
    pub fn new(config: ManagerConfig, scope: StateScope, worker: Arc<dyn Worker>) -> Self {
        let tasks = TaskTreeStore::new(scope, config.name.clone());
        Self {
            config,
            worker,
            tasks,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Append a root-level subtask. The ceiling is surfaced as an error
    /// value, with no mutation.
    pub fn add_subtask(
        &self,
        state: &mut dyn StateStore,
        title: &str,
        description: &str,
    ) -> Result<Subtask, ManagerError> {
        let mut tree = self.tasks.load(state);
        let task = tree.add_subtask(&SubtaskSpec::new(title, description), self.config.max_tasks)?;
        self.tasks.save(state, &tree)?;
        log_subtask_added!(task.task_id, task.title);
        Ok(task)
    }

    pub fn list_subtasks(&self, state: &dyn StateStore) -> Vec<Subtask> {
        self.tasks.load(state).subtasks
    }

    pub fn current_subtask(&self, state: &dyn StateStore) -> Option<Subtask> {
        self.tasks.load(state).current_subtask().cloned()
    }

    pub fn records(&self, state: &dyn StateStore) -> Vec<ExecutionRecord> {
        self.tasks.records(state)
    }

    pub fn pool_records(&self, state: &dyn StateStore) -> Vec<ExecutionRecord> {
        self.tasks.pool_records(state)
    }

    /// Hand the current subtask to the worker and fold its report back into
    /// the tree. The one suspending operation.
    pub async fn execute_current_subtask(
        &self,
        state: &mut dyn StateStore,
    ) -> Result<ExecutionOutcome, ManagerError> {
        let mut tree = self.tasks.load(state);
        let current = match tree.current_subtask() {
            // A pointer resting on a finished tail means nothing is
            // actionable until a new subtask is appended.
            Some(task) if !task.status.is_terminal() => task.clone(),
            _ => return Err(ManagerError::NoActiveSubtasks),
        };

        log_execute_start!(current.task_id, current.title);

        let request = WorkerRequest {
            task_id: current.task_id.clone(),
            title: current.title.clone(),
            description: current.description.clone(),
            payload: format::format_subtask(&current, self.config.format, self.config.type_hint),
        };

        let (parsed, raw) = match self.worker.run(request, &mut *state).await {
            Ok(WorkerResponse::Structured(value)) => {
                (ExecutionResult::from_value(&value), value.to_string())
            }
            Ok(WorkerResponse::Text(text)) => (
                format::parse_task_result_preferring(&text, self.config.format),
                text,
            ),
            Err(err) => (None, format!("worker error: {err}")),
        };

        // A result for the wrong task, or one that would violate the status
        // machine, is as unusable as no result at all. Re-reporting the same
        // status (incomplete, on a held task) is an accepted no-op.
        let parsed = parsed
            .filter(|r| r.task_id == current.task_id)
            .filter(|r| r.status == current.status || current.status.can_transition_to(r.status));

        let (result, malformed) = match parsed {
            Some(result) => (result, false),
            None => (
                ExecutionResult::new(
                    current.task_id.clone(),
                    TaskStatus::Incomplete,
                    raw,
                    TASK_RESULT_MALFORMED_MSG,
                ),
                true,
            ),
        };

        let task = tree
            .current_subtask_mut()
            .ok_or(ManagerError::NoActiveSubtasks)?;
        if task.status != result.status {
            task.transition_to(result.status)?;
        }
        let record = ExecutionRecord::merge(task, &result);

        let action = if result.status == TaskStatus::Incomplete {
            requires_decomposition_msg(&current.task_id)
        } else {
            match tree.advance() {
                Some(next) => advanced_msg(&next.task_id),
                None => NO_ACTIVE_SUBTASKS_MSG.to_string(),
            }
        };

        self.tasks.save(state, &tree)?;
        self.tasks.append_record(state, &record)?;

        if malformed {
            log_result_malformed!(current.task_id);
        } else {
            log_execute_finish!(current.task_id, result.status);
        }

        Ok(ExecutionOutcome {
            record,
            action,
            error: malformed.then(|| TASK_RESULT_MALFORMED_MSG.to_string()),
        })
    }

    /// Insert child subtasks after the current task. `task_id` must name the
    /// current task; anything else is rejected without mutation.
    pub fn decompose_subtask(
        &self,
        state: &mut dyn StateStore,
        task_id: &str,
        decomposition: &Decomposition,
    ) -> Result<Vec<Subtask>, ManagerError> {
        let mut tree = self.tasks.load(state);
        let current = tree
            .current_subtask()
            .ok_or(ManagerError::NoActiveSubtasks)?;
        if current.task_id != task_id {
            return Err(ManagerError::NotCurrentTask {
                task_id: task_id.to_string(),
            });
        }
        if decomposition.subtasks.is_empty() {
            return Err(ManagerError::EmptyDecomposition);
        }

        let children = tree.decompose_current(&decomposition.subtasks)?;
        self.tasks.save(state, &tree)?;
        log_subtask_decomposed!(task_id, children.len());
        Ok(children)
    }

    /// Mark the current task skipped and advance. Requires a non-empty
    /// reason; the reason becomes the record's output.
    pub fn skip(
        &self,
        state: &mut dyn StateStore,
        task_id: &str,
        reason: &str,
    ) -> Result<Option<Subtask>, ManagerError> {
        if reason.trim().is_empty() {
            return Err(ManagerError::EmptySkipReason);
        }

        let mut tree = self.tasks.load(state);
        let current = tree
            .current_subtask()
            .ok_or(ManagerError::NoActiveSubtasks)?;
        if current.task_id != task_id {
            return Err(ManagerError::NotCurrentTask {
                task_id: task_id.to_string(),
            });
        }

        let task = tree
            .current_subtask_mut()
            .ok_or(ManagerError::NoActiveSubtasks)?;
        task.transition_to(TaskStatus::Skipped)?;

        let result = ExecutionResult::new(
            task.task_id.clone(),
            TaskStatus::Skipped,
            reason.trim(),
            SKIPPED_SUMMARY,
        );
        let record = ExecutionRecord::merge(task, &result);

        let next = tree.advance().cloned();
        self.tasks.save(state, &tree)?;
        self.tasks.append_record(state, &record)?;
        log_subtask_skipped!(task_id, reason.trim());

        Ok(next)
    }
}
