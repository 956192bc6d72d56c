//! Typed errors surfaced by the controller and the task-tree store.
//!
//! Display strings are part of the contract: the tool surface hands them to
//! the external planner verbatim, so they stay stable and actionable.

use crate::models::TaskStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("{}", crate::manager::NO_ACTIVE_SUBTASKS_MSG)]
    NoActiveSubtasks,

    #[error("You have reached the limit of available subtasks.")]
    TaskLimitReached,

    #[error("Task {task_id} is not the current task! Check the current task to get the description.")]
    NotCurrentTask { task_id: String },

    #[error("Decomposition must contain at least one subtask.")]
    EmptyDecomposition,

    #[error("Skip reason must not be empty.")]
    EmptySkipReason,

    #[error("Invalid status transition {from} -> {to}.")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Failed to persist task state: {0}")]
    Persistence(String),
}
