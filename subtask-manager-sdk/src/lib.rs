//! Contract surface shared by the subtask manager and its workers.
//!
//! A *worker* is the opaque capability (typically an LLM-backed agent) that
//! executes one subtask and reports back. Worker implementations depend on
//! this crate only: the [`Worker`] trait, the request/response types, the
//! [`StateStore`] persistence abstraction, and the structured log events the
//! manager emits while driving a plan.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// Re-export async trait for convenience
pub use async_trait::async_trait;

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Caller-owned key-value persistence context.
///
/// The manager never owns its state: every operation loads from and saves
/// back to a store supplied by the caller, keyed by composite strings.
/// Values are plain JSON structures so any backend that can round-trip JSON
/// qualifies.
pub trait StateStore: Send {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value);
    fn remove(&mut self, key: &str) -> Option<Value>;
}

/// HashMap-backed state store. The default context for tests and for
/// single-session planners that do not need durability.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: HashMap<String, Value>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }
}

/// A subtask rendered in the manager's configured wire format: structured
/// data for the JSON codec, text for every other format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskPayload {
    // Text must precede Structured: untagged deserialization tries variants
    // in order, and Value would swallow plain strings.
    Text(String),
    Structured(Value),
}

impl TaskPayload {
    /// Collapse into a JSON value (text becomes a JSON string).
    pub fn into_value(self) -> Value {
        match self {
            TaskPayload::Structured(value) => value,
            TaskPayload::Text(text) => Value::String(text),
        }
    }

    /// Collapse into plain text (structured data is serialized compactly).
    pub fn into_text(self) -> String {
        match self {
            TaskPayload::Structured(value) => value.to_string(),
            TaskPayload::Text(text) => text,
        }
    }
}

/// Request handed to a worker for one subtask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub task_id: String,
    pub title: String,
    pub description: String,
    /// The subtask rendered in the manager's wire format, ready to embed in
    /// a prompt or pipe to a process.
    pub payload: TaskPayload,
}

/// A worker's raw reply: free text to be parsed, or already-structured data.
#[derive(Debug, Clone)]
pub enum WorkerResponse {
    Text(String),
    Structured(Value),
}

/// The external execution capability consumed by the manager.
///
/// Implementations receive the rendered request plus the same persistence
/// context the manager operates on. Errors never propagate past the manager:
/// a failing worker is downgraded to an incomplete result on the caller's
/// side, so `run` is free to fail loudly.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn run(
        &self,
        request: WorkerRequest,
        state: &mut dyn StateStore,
    ) -> WorkerResult<WorkerResponse>;
}

/// Structured progress events emitted by the manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManagerLog {
    /// Subtask appended to the plan
    SubtaskAdded {
        task_id: String,
        title: String,
    },
    /// Worker invocation started
    ExecuteStarted {
        task_id: String,
        title: String,
    },
    /// Worker invocation finished with a parsed result
    ExecuteFinished {
        task_id: String,
        status: String,
    },
    /// Worker output could not be parsed into a result
    ResultMalformed {
        task_id: String,
    },
    /// Subtask skipped by the planner
    SubtaskSkipped {
        task_id: String,
        reason: String,
    },
    /// Subtask decomposed into children
    SubtaskDecomposed {
        task_id: String,
        children: usize,
    },
}

impl ManagerLog {
    /// Emit this log event to stderr for supervisor parsing
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("__TM_EVENT__:{}", json);
            // Force flush stderr in async/concurrent contexts
            let _ = std::io::stderr().flush();
        }
    }
}

/// Helper macros for manager logging
#[macro_export]
macro_rules! log_subtask_added {
    ($task_id:expr, $title:expr) => {
        $crate::ManagerLog::SubtaskAdded {
            task_id: $task_id.to_string(),
            title: $title.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_execute_start {
    ($task_id:expr, $title:expr) => {
        $crate::ManagerLog::ExecuteStarted {
            task_id: $task_id.to_string(),
            title: $title.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_execute_finish {
    ($task_id:expr, $status:expr) => {
        $crate::ManagerLog::ExecuteFinished {
            task_id: $task_id.to_string(),
            status: $status.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_result_malformed {
    ($task_id:expr) => {
        $crate::ManagerLog::ResultMalformed {
            task_id: $task_id.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_subtask_skipped {
    ($task_id:expr, $reason:expr) => {
        $crate::ManagerLog::SubtaskSkipped {
            task_id: $task_id.to_string(),
            reason: $reason.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_subtask_decomposed {
    ($task_id:expr, $children:expr) => {
        $crate::ManagerLog::SubtaskDecomposed {
            task_id: $task_id.to_string(),
            children: $children,
        }
        .emit();
    };
}
