//! Core data model: subtasks, execution results, and the status machine.

use crate::error::ManagerError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Lifecycle status of a subtask.
///
/// Transitions only move forward: `new` can become any of the three
/// outcomes, `incomplete` resolves to `done` through the trajectory of its
/// decomposed children, `done` and `skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    New,
    Done,
    Incomplete,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::New => "new",
            TaskStatus::Done => "done",
            TaskStatus::Incomplete => "incomplete",
            TaskStatus::Skipped => "skipped",
        }
    }

    /// Parse a status token, case-insensitively. Returns `None` for
    /// anything outside the four known states.
    pub fn parse(token: &str) -> Option<TaskStatus> {
        match token.trim().to_ascii_lowercase().as_str() {
            "new" => Some(TaskStatus::New),
            "done" => Some(TaskStatus::Done),
            "incomplete" => Some(TaskStatus::Incomplete),
            "skipped" => Some(TaskStatus::Skipped),
            _ => None,
        }
    }

    /// `done` and `skipped` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Skipped)
    }

    pub fn allowed_transitions(self) -> &'static [TaskStatus] {
        match self {
            TaskStatus::New => &[TaskStatus::Done, TaskStatus::Incomplete, TaskStatus::Skipped],
            TaskStatus::Incomplete => &[TaskStatus::Done],
            TaskStatus::Done | TaskStatus::Skipped => &[],
        }
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn task_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d+)*$").expect("task id regex is valid"))
}

/// Dotted-numeric hierarchical id check (`0`, `3`, `1.2`, `1.2.10`).
pub fn is_valid_task_id(id: &str) -> bool {
    task_id_regex().is_match(id)
}

/// Metadata describing a subtask to be created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskSpec {
    /// Short subtask title
    pub title: String,
    /// Detailed subtask description
    pub description: String,
}

impl SubtaskSpec {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// An ordered list of child specs produced by a decomposition step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decomposition {
    #[serde(default)]
    pub subtasks: Vec<SubtaskSpec>,
}

/// One unit of planned work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    /// Dotted-numeric hierarchical identifier; root tasks count up from 0,
    /// children of a decomposed task get `{parent}.{1..n}`.
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
}

impl Subtask {
    pub fn new(task_id: impl Into<String>, spec: &SubtaskSpec) -> Self {
        Self {
            task_id: task_id.into(),
            title: spec.title.clone(),
            description: spec.description.clone(),
            status: TaskStatus::New,
        }
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        self.status.can_transition_to(next)
    }

    pub fn transition_to(&mut self, next: TaskStatus) -> Result<(), ManagerError> {
        if !self.can_transition_to(next) {
            return Err(ManagerError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// The worker's report on one subtask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Must equal the current subtask's id to be accepted.
    pub task_id: String,
    /// Reported outcome; `new` is not a reportable status.
    pub status: TaskStatus,
    /// Factual account of what happened.
    pub output: String,
    /// Brief recap; for incomplete results, a statement of remaining work.
    pub summary: String,
}

impl ExecutionResult {
    pub fn new(
        task_id: impl Into<String>,
        status: TaskStatus,
        output: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            output: output.into(),
            summary: summary.into(),
        }
    }

    /// Fallible constructor from already-parsed field strings. Shared by the
    /// markdown and xml parsers, which scan fields out of free text.
    pub fn from_parts(task_id: &str, status: &str, output: &str, summary: &str) -> Option<Self> {
        let task_id = task_id.trim();
        if !is_valid_task_id(task_id) {
            return None;
        }
        let status = TaskStatus::parse(status)?;
        if status == TaskStatus::New {
            return None;
        }
        Some(Self {
            task_id: task_id.to_string(),
            status,
            output: output.trim().to_string(),
            summary: summary.trim().to_string(),
        })
    }

    /// Fallible constructor from a generic structured value.
    ///
    /// Tolerates loosely-typed input the way LLM output tends to arrive:
    /// numeric task ids are coerced to strings, scalar output/summary values
    /// are stringified. Anything that is not an object carrying all four
    /// fields is rejected with `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let task_id = coerce_scalar(map.get("task_id")?)?;
        let status = map.get("status")?.as_str()?;
        let output = coerce_scalar(map.get("output")?)?;
        let summary = coerce_scalar(map.get("summary")?)?;
        Self::from_parts(&task_id, status, &output, &summary)
    }
}

/// Accept strings and numbers where a string field is expected.
fn coerce_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Audit-log entry merging a subtask snapshot with its execution result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub output: String,
    pub summary: String,
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Merge a subtask and its result; the duplicate `task_id` collapses and
    /// the result's status wins (the subtask has already transitioned).
    pub fn merge(subtask: &Subtask, result: &ExecutionResult) -> Self {
        Self {
            task_id: subtask.task_id.clone(),
            title: subtask.title.clone(),
            description: subtask.description.clone(),
            status: result.status,
            output: result.output.clone(),
            summary: result.summary.clone(),
            recorded_at: Utc::now(),
        }
    }
}
