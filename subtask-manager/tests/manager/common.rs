//! Common fixtures for manager integration tests

use serde_json::json;
use std::sync::Arc;
use subtask_manager::manager::{ManagerConfig, TaskManager};
use subtask_manager::workers::FnWorker;
use subtask_manager::StateScope;
use subtask_manager_sdk::{Worker, WorkerResponse};

/// Worker that reports every task done.
pub fn done_worker() -> Arc<dyn Worker> {
    Arc::new(FnWorker::new(|req| {
        Ok(WorkerResponse::Structured(json!({
            "task_id": req.task_id,
            "status": "done",
            "output": format!("completed {}", req.task_id),
            "summary": "ok",
        })))
    }))
}

/// Worker that reports every task incomplete.
pub fn incomplete_worker() -> Arc<dyn Worker> {
    Arc::new(FnWorker::new(|req| {
        Ok(WorkerResponse::Structured(json!({
            "task_id": req.task_id,
            "status": "incomplete",
            "output": format!("blocked at {}", req.task_id),
            "summary": "need more steps",
        })))
    }))
}

/// Worker that reports one specific task incomplete and everything else done.
pub fn incomplete_at_worker(blocked_id: &str) -> Arc<dyn Worker> {
    let blocked_id = blocked_id.to_string();
    Arc::new(FnWorker::new(move |req| {
        let status = if req.task_id == blocked_id {
            "incomplete"
        } else {
            "done"
        };
        Ok(WorkerResponse::Structured(json!({
            "task_id": req.task_id,
            "status": status,
            "output": format!("worked on {}", req.task_id),
            "summary": "ok",
        })))
    }))
}

pub fn mk_manager(worker: Arc<dyn Worker>, use_skip: bool) -> TaskManager {
    let config = ManagerConfig::new("tm", 100).with_skip(use_skip);
    TaskManager::new(config, StateScope::new("test", "invocation-1"), worker)
}

pub fn decomposition(specs: &[(&str, &str)]) -> serde_json::Value {
    json!({
        "subtasks": specs
            .iter()
            .map(|(title, description)| json!({"title": title, "description": description}))
            .collect::<Vec<_>>(),
    })
}
