//! Task-tree state and its persistence over a caller-owned key-value store.
//!
//! The tree is the single source of truth for the ordered subtask sequence
//! and the current pointer. It is held as a plain value: every operation
//! loads the blob, mutates a copy, and saves it back explicitly. No
//! reference semantics are assumed of the backing store.

use crate::error::ManagerError;
use crate::models::{ExecutionRecord, Subtask, SubtaskSpec};
use serde::{Deserialize, Serialize};
use subtask_manager_sdk::StateStore;

/// Fixed middle segment of every composite key.
const GLOBAL_SCOPE: &str = "tasks";

/// Scope half of the composite state key: which conversation/session owns
/// the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateScope {
    pub namespace: String,
    pub invocation_id: String,
}

impl StateScope {
    pub fn new(namespace: impl Into<String>, invocation_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            invocation_id: invocation_id.into(),
        }
    }
}

/// The persisted task-tree value: ordered subtasks plus the current pointer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskTree {
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub current_index: Option<usize>,
}

impl TaskTree {
    /// Dereference the current pointer. Out-of-bounds pointers resolve to
    /// `None` rather than panicking.
    pub fn current_subtask(&self) -> Option<&Subtask> {
        self.subtasks.get(self.current_index?)
    }

    pub fn current_subtask_mut(&mut self) -> Option<&mut Subtask> {
        self.subtasks.get_mut(self.current_index?)
    }

    /// Next root-level id: integer prefix of the last entry plus one, or the
    /// origin (0) for an empty tree.
    pub fn next_root_id(&self) -> String {
        match self.subtasks.last() {
            None => "0".to_string(),
            Some(last) => {
                let root = last.task_id.split('.').next().unwrap_or("");
                let n: u64 = root.parse().unwrap_or(0);
                (n + 1).to_string()
            }
        }
    }

    /// Append a root-level subtask, respecting the `max_tasks` ceiling.
    ///
    /// Pointer bookkeeping: the first add initializes the pointer; a pointer
    /// resting on a finished task at the end of the list moves to the fresh
    /// one, so "current" keeps tracking the next actionable task.
    pub fn add_subtask(
        &mut self,
        spec: &SubtaskSpec,
        max_tasks: usize,
    ) -> Result<Subtask, ManagerError> {
        if self.subtasks.len() >= max_tasks {
            return Err(ManagerError::TaskLimitReached);
        }

        let task = Subtask::new(self.next_root_id(), spec);
        self.subtasks.push(task.clone());

        let appended_index = self.subtasks.len() - 1;
        match self.current_index {
            None => self.current_index = Some(appended_index),
            Some(idx) => {
                let was_tail = idx + 1 == appended_index;
                if was_tail && self.subtasks[idx].status.is_terminal() {
                    self.current_index = Some(appended_index);
                }
            }
        }

        Ok(task)
    }

    /// Splice child subtasks `{current}.{1..n}` immediately after the
    /// current entry and move the pointer to the first child. The parent
    /// stays in the sequence as a record.
    pub fn decompose_current(
        &mut self,
        specs: &[SubtaskSpec],
    ) -> Result<Vec<Subtask>, ManagerError> {
        if specs.is_empty() {
            return Err(ManagerError::EmptyDecomposition);
        }
        let idx = match self.current_index {
            Some(i) if i < self.subtasks.len() => i,
            _ => return Err(ManagerError::NoActiveSubtasks),
        };

        let parent_id = self.subtasks[idx].task_id.clone();
        let children: Vec<Subtask> = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| Subtask::new(format!("{parent_id}.{}", i + 1), spec))
            .collect();

        self.subtasks
            .splice(idx + 1..idx + 1, children.iter().cloned());
        self.current_index = Some(idx + 1);

        Ok(children)
    }

    /// Move the pointer to the next entry if one exists. Returns the new
    /// current subtask, or `None` when already at the tail.
    pub fn advance(&mut self) -> Option<&Subtask> {
        let idx = self.current_index?;
        if idx + 1 < self.subtasks.len() {
            self.current_index = Some(idx + 1);
            self.subtasks.get(idx + 1)
        } else {
            None
        }
    }
}

/// Repository binding a [`TaskTree`] (plus its record logs) to composite
/// keys in a caller-owned [`StateStore`].
#[derive(Debug, Clone)]
pub struct TaskTreeStore {
    scope: StateScope,
    name: String,
}

impl TaskTreeStore {
    pub fn new(scope: StateScope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }

    /// `{namespace}::tasks::{invocation_id}::{name}`
    pub fn tree_key(&self) -> String {
        format!(
            "{}::{}::{}::{}",
            self.scope.namespace, GLOBAL_SCOPE, self.scope.invocation_id, self.name
        )
    }

    /// Audit log key, scoped like the tree.
    pub fn records_key(&self) -> String {
        format!("{}::records", self.tree_key())
    }

    /// Cross-invocation pool log key, shared by all managers in a namespace.
    pub fn pool_key(&self) -> String {
        format!("{}::{}::pool", self.scope.namespace, GLOBAL_SCOPE)
    }

    /// Load the tree, or an empty one if the key is unset or unreadable.
    pub fn load(&self, store: &dyn StateStore) -> TaskTree {
        store
            .get(&self.tree_key())
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, store: &mut dyn StateStore, tree: &TaskTree) -> Result<(), ManagerError> {
        let value =
            serde_json::to_value(tree).map_err(|e| ManagerError::Persistence(e.to_string()))?;
        store.set(&self.tree_key(), value);
        Ok(())
    }

    pub fn records(&self, store: &dyn StateStore) -> Vec<ExecutionRecord> {
        Self::load_records(store, &self.records_key())
    }

    pub fn pool_records(&self, store: &dyn StateStore) -> Vec<ExecutionRecord> {
        Self::load_records(store, &self.pool_key())
    }

    /// Append one record to both the audit log and the shared pool log.
    pub fn append_record(
        &self,
        store: &mut dyn StateStore,
        record: &ExecutionRecord,
    ) -> Result<(), ManagerError> {
        self.push_record(store, &self.records_key(), record)?;
        self.push_record(store, &self.pool_key(), record)
    }

    fn push_record(
        &self,
        store: &mut dyn StateStore,
        key: &str,
        record: &ExecutionRecord,
    ) -> Result<(), ManagerError> {
        let mut records = Self::load_records(store, key);
        records.push(record.clone());
        let value =
            serde_json::to_value(&records).map_err(|e| ManagerError::Persistence(e.to_string()))?;
        store.set(key, value);
        Ok(())
    }

    fn load_records(store: &dyn StateStore, key: &str) -> Vec<ExecutionRecord> {
        store
            .get(key)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }
}
