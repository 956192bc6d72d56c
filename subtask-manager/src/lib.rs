//! Coordinates multi-step execution of work delegated to an LLM-driven
//! worker, under the supervision of a planner that decomposes, sequences and
//! tracks subtasks.
//!
//! The pieces, leaf first: [`format`] is the result codec (four wire
//! formats, tolerant parsing of worker output); [`store`] holds the ordered
//! subtask tree and its current pointer, persisted through a caller-owned
//! key-value [`sdk::StateStore`]; [`manager`] is the state machine driving
//! execute → parse → transition → advance; [`tools`] flattens it into
//! independently callable operations for an external planner.

pub mod database;
pub mod error;
pub mod format;
pub mod manager;
pub mod models;
pub mod store;
pub mod tools;
pub mod workers;

pub use error::ManagerError;
pub use format::TaskFormat;
pub use manager::{ExecutionOutcome, ManagerConfig, TaskManager};
pub use models::{
    Decomposition, ExecutionRecord, ExecutionResult, Subtask, SubtaskSpec, TaskStatus,
};
pub use store::{StateScope, TaskTree, TaskTreeStore};
pub use tools::ManagerToolbox;

// Re-export the worker contract so downstream crates need only one import.
pub use subtask_manager_sdk as sdk;
