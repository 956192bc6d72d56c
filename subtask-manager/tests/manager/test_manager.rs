//! Controller behavior: advance-on-done, hold-on-incomplete, decomposition,
//! skip, malformed-output downgrade, record accumulation, persistence.

use super::common::*;
use std::sync::Arc;
use subtask_manager::manager::{
    requires_decomposition_msg, ManagerConfig, TaskManager, NO_ACTIVE_SUBTASKS_MSG,
    SKIPPED_SUMMARY, TASK_RESULT_MALFORMED_MSG,
};
use subtask_manager::workers::ScriptedWorker;
use subtask_manager::{Decomposition, ManagerError, StateScope, SubtaskSpec, TaskStatus};
use subtask_manager_sdk::MemoryStateStore;

fn decomp(specs: &[(&str, &str)]) -> Decomposition {
    Decomposition {
        subtasks: specs
            .iter()
            .map(|(t, d)| SubtaskSpec::new(*t, *d))
            .collect(),
    }
}

#[tokio::test]
async fn test_execute_all_then_new_task_becomes_current() {
    let manager = mk_manager(done_worker(), false);
    let mut state = MemoryStateStore::new();

    for i in 0..3 {
        manager
            .add_subtask(&mut state, &format!("t{i}"), &format!("d{i}"))
            .unwrap();
    }
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "0");

    for expected_id in ["0", "1", "2"] {
        let current = manager.current_subtask(&state).unwrap();
        assert_eq!(current.task_id, expected_id);

        let outcome = manager.execute_current_subtask(&mut state).await.unwrap();
        assert!(outcome.error.is_none());
        assert_eq!(outcome.record.task_id, expected_id);
        assert_eq!(outcome.record.status, TaskStatus::Done);
    }

    // Pointer rests on the finished tail.
    let tail = manager.current_subtask(&state).unwrap();
    assert_eq!(tail.task_id, "2");
    assert_eq!(tail.status, TaskStatus::Done);

    // Nothing is actionable until a new subtask arrives.
    let err = manager.execute_current_subtask(&mut state).await.unwrap_err();
    assert!(matches!(err, ManagerError::NoActiveSubtasks));

    manager.add_subtask(&mut state, "t3", "d3").unwrap();
    let current = manager.current_subtask(&state).unwrap();
    assert_eq!(current.task_id, "3");
    assert_eq!(current.status, TaskStatus::New);
}

#[tokio::test]
async fn test_incomplete_holds_pointer_and_demands_decomposition() {
    let manager = mk_manager(incomplete_worker(), false);
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    manager.add_subtask(&mut state, "t1", "d1").unwrap();

    let outcome = manager.execute_current_subtask(&mut state).await.unwrap();
    assert!(outcome.error.is_none());
    assert_eq!(outcome.record.status, TaskStatus::Incomplete);
    assert_eq!(outcome.action, requires_decomposition_msg("0"));

    // Pointer did not move.
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "0");
}

#[tokio::test]
async fn test_decompose_then_children_then_next_root() {
    let manager = mk_manager(incomplete_at_worker("1"), false);
    let mut state = MemoryStateStore::new();

    for i in 0..3 {
        manager
            .add_subtask(&mut state, &format!("t{i}"), &format!("d{i}"))
            .unwrap();
    }

    // 0 done -> current becomes 1
    manager.execute_current_subtask(&mut state).await.unwrap();
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "1");

    // 1 incomplete -> stays current and demands decomposition
    let outcome = manager.execute_current_subtask(&mut state).await.unwrap();
    assert_eq!(outcome.record.task_id, "1");
    assert_eq!(outcome.record.status, TaskStatus::Incomplete);
    assert!(outcome.action.contains(&requires_decomposition_msg("1")));

    // Decompose 1 into 1.1 and 1.2 -> current becomes 1.1
    let children = manager
        .decompose_subtask(&mut state, "1", &decomp(&[("s1", "sd1"), ("s2", "sd2")]))
        .unwrap();
    assert_eq!(children[0].task_id, "1.1");
    assert_eq!(children[1].task_id, "1.2");
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "1.1");

    // Children done -> current becomes the next root (2)
    manager.execute_current_subtask(&mut state).await.unwrap();
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "1.2");

    manager.execute_current_subtask(&mut state).await.unwrap();
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "2");
}

#[tokio::test]
async fn test_decompose_only_children_then_no_active_tasks() {
    let manager = mk_manager(incomplete_at_worker("0"), false);
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    manager.execute_current_subtask(&mut state).await.unwrap();

    manager
        .decompose_subtask(&mut state, "0", &decomp(&[("a", "da"), ("b", "db")]))
        .unwrap();
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "0.1");

    manager.execute_current_subtask(&mut state).await.unwrap();
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "0.2");

    let outcome = manager.execute_current_subtask(&mut state).await.unwrap();
    assert_eq!(outcome.action, NO_ACTIVE_SUBTASKS_MSG);

    // Appending after the decomposed run resumes at the next root id.
    let task = manager.add_subtask(&mut state, "t1", "d1").unwrap();
    assert_eq!(task.task_id, "1");
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "1");
}

#[tokio::test]
async fn test_malformed_worker_output_downgrades_to_incomplete() {
    let worker = ScriptedWorker::new().push_text("this is not valid");
    let manager = mk_manager(Arc::new(worker), false);
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    let outcome = manager.execute_current_subtask(&mut state).await.unwrap();

    assert_eq!(outcome.error.as_deref(), Some(TASK_RESULT_MALFORMED_MSG));
    assert_eq!(outcome.record.task_id, "0");
    assert_eq!(outcome.record.status, TaskStatus::Incomplete);
    assert_eq!(outcome.record.summary, TASK_RESULT_MALFORMED_MSG);
    assert!(outcome.record.output.contains("this is not valid"));

    // The synthesized incomplete result holds the pointer like a real one.
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "0");
    assert_eq!(
        manager.current_subtask(&state).unwrap().status,
        TaskStatus::Incomplete
    );
}

#[tokio::test]
async fn test_worker_error_treated_as_malformed() {
    let worker = ScriptedWorker::new().push_error("model timed out");
    let manager = mk_manager(Arc::new(worker), false);
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    let outcome = manager.execute_current_subtask(&mut state).await.unwrap();

    assert_eq!(outcome.error.as_deref(), Some(TASK_RESULT_MALFORMED_MSG));
    assert_eq!(outcome.record.status, TaskStatus::Incomplete);
    assert!(outcome.record.output.contains("model timed out"));
}

#[tokio::test]
async fn test_result_for_wrong_task_id_is_malformed() {
    let worker = ScriptedWorker::new().push_structured(serde_json::json!({
        "task_id": "99",
        "status": "done",
        "output": "did someone else's work",
        "summary": "oops",
    }));
    let manager = mk_manager(Arc::new(worker), false);
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    let outcome = manager.execute_current_subtask(&mut state).await.unwrap();

    assert_eq!(outcome.error.as_deref(), Some(TASK_RESULT_MALFORMED_MSG));
    assert_eq!(outcome.record.task_id, "0");
    assert_eq!(outcome.record.status, TaskStatus::Incomplete);
}

#[tokio::test]
async fn test_retry_after_incomplete_can_finish() {
    let worker = ScriptedWorker::new()
        .push_structured(serde_json::json!({
            "task_id": "0", "status": "incomplete", "output": "stuck", "summary": "retrying",
        }))
        .push_structured(serde_json::json!({
            "task_id": "0", "status": "done", "output": "second try worked", "summary": "ok",
        }));
    let manager = mk_manager(Arc::new(worker), false);
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    manager.add_subtask(&mut state, "t1", "d1").unwrap();

    let held = manager.execute_current_subtask(&mut state).await.unwrap();
    assert_eq!(held.record.status, TaskStatus::Incomplete);
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "0");

    // incomplete -> done is a legal transition; the pointer moves on.
    let finished = manager.execute_current_subtask(&mut state).await.unwrap();
    assert!(finished.error.is_none());
    assert_eq!(finished.record.status, TaskStatus::Done);
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "1");
}

#[tokio::test]
async fn test_decompose_requires_current_task_id() {
    let manager = mk_manager(incomplete_worker(), false);
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    manager.add_subtask(&mut state, "t1", "d1").unwrap();
    manager.execute_current_subtask(&mut state).await.unwrap();

    let err = manager
        .decompose_subtask(&mut state, "1", &decomp(&[("x", "y")]))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        ManagerError::NotCurrentTask {
            task_id: "1".to_string()
        }
        .to_string()
    );

    // Zero mutation: still two subtasks, current unchanged.
    assert_eq!(manager.list_subtasks(&state).len(), 2);
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "0");

    // Correct id works.
    let children = manager
        .decompose_subtask(&mut state, "0", &decomp(&[("x", "y")]))
        .unwrap();
    assert_eq!(children[0].task_id, "0.1");
}

#[tokio::test]
async fn test_decompose_rejects_empty_list() {
    let manager = mk_manager(incomplete_worker(), false);
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    let err = manager
        .decompose_subtask(&mut state, "0", &decomp(&[]))
        .unwrap_err();
    assert!(matches!(err, ManagerError::EmptyDecomposition));
    assert_eq!(manager.list_subtasks(&state).len(), 1);
}

#[tokio::test]
async fn test_skip_validations_and_state_transition() {
    let manager = mk_manager(done_worker(), true);
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    manager.add_subtask(&mut state, "t1", "d1").unwrap();

    // Empty reason rejected, no state change.
    let err = manager.skip(&mut state, "0", "   ").unwrap_err();
    assert!(matches!(err, ManagerError::EmptySkipReason));
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "0");

    // Wrong task_id rejected (current is 0).
    let err = manager.skip(&mut state, "1", "nope").unwrap_err();
    assert!(matches!(err, ManagerError::NotCurrentTask { .. }));

    // Valid skip marks 0 skipped and moves to 1.
    let next = manager.skip(&mut state, "0", "redundant").unwrap().unwrap();
    assert_eq!(next.task_id, "1");

    let t0 = manager
        .list_subtasks(&state)
        .into_iter()
        .find(|t| t.task_id == "0")
        .unwrap();
    assert_eq!(t0.status, TaskStatus::Skipped);

    let records = manager.records(&state);
    let last = records.last().unwrap();
    assert_eq!(last.task_id, "0");
    assert_eq!(last.status, TaskStatus::Skipped);
    assert_eq!(last.output, "redundant");
    assert_eq!(last.summary, SKIPPED_SUMMARY);
}

#[tokio::test]
async fn test_skip_at_tail_reports_no_active_tasks() {
    let manager = mk_manager(done_worker(), true);
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    let next = manager.skip(&mut state, "0", "not needed").unwrap();
    assert!(next.is_none());

    let err = manager.execute_current_subtask(&mut state).await.unwrap_err();
    assert!(matches!(err, ManagerError::NoActiveSubtasks));

    // A new subtask becomes current even though the tail is skipped.
    manager.add_subtask(&mut state, "t1", "d1").unwrap();
    assert_eq!(manager.current_subtask(&state).unwrap().task_id, "1");
}

#[tokio::test]
async fn test_skip_incomplete_task_is_an_invalid_transition() {
    let manager = mk_manager(incomplete_worker(), true);
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    manager.execute_current_subtask(&mut state).await.unwrap();

    let err = manager.skip(&mut state, "0", "give up").unwrap_err();
    assert!(matches!(err, ManagerError::InvalidTransition { .. }));
    assert_eq!(
        manager.current_subtask(&state).unwrap().status,
        TaskStatus::Incomplete
    );
}

#[tokio::test]
async fn test_records_accumulate_in_call_order() {
    let manager = mk_manager(done_worker(), false);
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    manager.add_subtask(&mut state, "t1", "d1").unwrap();

    manager.execute_current_subtask(&mut state).await.unwrap();
    manager.execute_current_subtask(&mut state).await.unwrap();

    let records = manager.records(&state);
    let ids: Vec<&str> = records.iter().map(|r| r.task_id.as_str()).collect();
    assert_eq!(ids, vec!["0", "1"]);
    assert!(records.iter().all(|r| r.status == TaskStatus::Done));
}

#[tokio::test]
async fn test_pool_log_spans_invocations() {
    let mut state = MemoryStateStore::new();

    let first = TaskManager::new(
        ManagerConfig::new("tm", 100),
        StateScope::new("app", "inv-1"),
        done_worker(),
    );
    first.add_subtask(&mut state, "t0", "d0").unwrap();
    first.execute_current_subtask(&mut state).await.unwrap();

    let second = TaskManager::new(
        ManagerConfig::new("tm", 100),
        StateScope::new("app", "inv-2"),
        done_worker(),
    );
    second.add_subtask(&mut state, "u0", "e0").unwrap();
    second.execute_current_subtask(&mut state).await.unwrap();

    // Audit logs are per invocation; the pool sees both.
    assert_eq!(first.records(&state).len(), 1);
    assert_eq!(second.records(&state).len(), 1);
    assert_eq!(second.pool_records(&state).len(), 2);
}

#[tokio::test]
async fn test_task_limit_rejected_without_mutation() {
    let manager = TaskManager::new(
        ManagerConfig::new("tm", 2),
        StateScope::new("test", "invocation-1"),
        done_worker(),
    );
    let mut state = MemoryStateStore::new();

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    manager.add_subtask(&mut state, "t1", "d1").unwrap();

    let err = manager.add_subtask(&mut state, "t2", "d2").unwrap_err();
    assert!(matches!(err, ManagerError::TaskLimitReached));
    assert_eq!(manager.list_subtasks(&state).len(), 2);
}

#[tokio::test]
async fn test_state_survives_manager_instances() {
    let mut state = MemoryStateStore::new();
    let scope = StateScope::new("app", "inv-1");

    {
        let manager = TaskManager::new(ManagerConfig::new("tm", 100), scope.clone(), done_worker());
        manager.add_subtask(&mut state, "t0", "d0").unwrap();
        manager.execute_current_subtask(&mut state).await.unwrap();
    }

    // A fresh instance over the same store picks up where the first left off.
    let manager = TaskManager::new(ManagerConfig::new("tm", 100), scope, done_worker());
    let tasks = manager.list_subtasks(&state);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Done);
    assert_eq!(manager.records(&state).len(), 1);
}

#[tokio::test]
async fn test_manager_over_sqlite_store() {
    let mut state = subtask_manager::database::SqliteStateStore::new_in_memory().unwrap();
    let manager = mk_manager(done_worker(), false);

    manager.add_subtask(&mut state, "t0", "d0").unwrap();
    let outcome = manager.execute_current_subtask(&mut state).await.unwrap();
    assert_eq!(outcome.record.status, TaskStatus::Done);
    assert_eq!(manager.records(&state).len(), 1);
}
