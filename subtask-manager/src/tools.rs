//! Flat tool surface for an external planner.
//!
//! Each operation is independently callable, takes the caller's persistence
//! context, and returns a plain JSON envelope: `{"result": ...}` on success,
//! `{"error": "..."}` on a rejected call. Execute additionally returns
//! `record`/`action` (and `error` when the worker output was downgraded).
//! No logic lives here beyond argument validation and translation.

use crate::manager::{TaskManager, NO_ACTIVE_SUBTASKS_MSG};
use crate::models::Decomposition;
use serde_json::{json, Value};
use subtask_manager_sdk::StateStore;

use crate::format;

pub struct ManagerToolbox {
    manager: TaskManager,
}

impl ManagerToolbox {
    pub fn new(manager: TaskManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &TaskManager {
        &self.manager
    }

    /// Names of the operations this toolbox exposes, for the planner's tool
    /// listing. `skip` appears only when enabled in the config.
    pub fn tool_names(&self) -> Vec<&'static str> {
        let mut names = vec![
            "add_subtask",
            "list_subtasks",
            "get_current_subtask",
            "get_records",
            "execute_current_subtask",
            "decompose_subtask",
        ];
        if self.manager.config().use_skip {
            names.push("skip");
        }
        names
    }

    /// Append a new subtask to the plan.
    pub fn add_subtask(&self, state: &mut dyn StateStore, title: &str, description: &str) -> Value {
        match self.manager.add_subtask(state, title, description) {
            Ok(task) => json!({
                "result": format::format_subtask(&task, self.format(), false).into_value()
            }),
            Err(err) => json!({ "error": err.to_string() }),
        }
    }

    /// Return all known subtasks.
    pub fn list_subtasks(&self, state: &dyn StateStore) -> Value {
        let tasks = self.manager.list_subtasks(state);
        json!({ "result": format::format_subtasks(&tasks, self.format(), false).into_value() })
    }

    /// Return the current subtask, or the no-active-subtasks message.
    pub fn get_current_subtask(&self, state: &dyn StateStore) -> Value {
        match self.manager.current_subtask(state) {
            Some(task) => json!({
                "result": format::format_subtask(&task, self.format(), false).into_value()
            }),
            None => json!({ "result": NO_ACTIVE_SUBTASKS_MSG }),
        }
    }

    /// Return the accumulated execution records.
    pub fn get_records(&self, state: &dyn StateStore) -> Value {
        let records = self.manager.records(state);
        json!({ "result": serde_json::to_value(records).unwrap_or(Value::Null) })
    }

    /// Execute the current subtask through the worker.
    pub async fn execute_current_subtask(&self, state: &mut dyn StateStore) -> Value {
        match self.manager.execute_current_subtask(state).await {
            Ok(outcome) => serde_json::to_value(&outcome).unwrap_or(Value::Null),
            Err(err) => json!({ "error": err.to_string() }),
        }
    }

    /// Decompose the current subtask into children. The decomposition
    /// argument is validated against `{"subtasks": [{title, description}]}`.
    pub fn decompose_subtask(
        &self,
        state: &mut dyn StateStore,
        task_id: &str,
        decomposition: Value,
    ) -> Value {
        let decomposition: Decomposition = match serde_json::from_value(decomposition) {
            Ok(d) => d,
            Err(err) => return json!({ "error": format!("invalid decomposition: {err}") }),
        };
        match self
            .manager
            .decompose_subtask(state, task_id, &decomposition)
        {
            Ok(children) => json!({
                "result": format::format_subtasks(&children, self.format(), false).into_value()
            }),
            Err(err) => json!({ "error": err.to_string() }),
        }
    }

    /// Skip the current subtask with a reason. Rejected when skip is not
    /// enabled for this manager.
    pub fn skip(&self, state: &mut dyn StateStore, task_id: &str, reason: &str) -> Value {
        if !self.manager.config().use_skip {
            return json!({ "error": "skip is not enabled for this manager" });
        }
        match self.manager.skip(state, task_id, reason) {
            Ok(Some(next)) => json!({
                "result": format::format_subtask(&next, self.format(), false).into_value()
            }),
            Ok(None) => json!({ "result": NO_ACTIVE_SUBTASKS_MSG }),
            Err(err) => json!({ "error": err.to_string() }),
        }
    }

    fn format(&self) -> format::TaskFormat {
        self.manager.config().format
    }
}
