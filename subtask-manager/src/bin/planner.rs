//! Minimal CLI planner: seed subtasks, drive them through a worker, print
//! the record log. Useful for exercising a worker command end to end.

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use subtask_manager::manager::{ManagerConfig, TaskManager, NO_ACTIVE_SUBTASKS_MSG};
use subtask_manager::database::SqliteStateStore;
use subtask_manager::workers::{CommandWorker, FnWorker};
use subtask_manager::{StateScope, TaskFormat};
use subtask_manager_sdk::{MemoryStateStore, StateStore, Worker, WorkerResponse};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "planner", about = "Drive a queue of subtasks through a worker")]
struct Args {
    /// Subtasks to seed, as "title: description" pairs (repeatable)
    #[arg(short, long = "task")]
    tasks: Vec<String>,

    /// Wire format for worker payloads (json, markdown, yaml, xml)
    #[arg(long, default_value = "json")]
    format: TaskFormatArg,

    /// Worker command to spawn per subtask; omit to use a stub worker that
    /// reports every task done
    #[arg(long)]
    worker: Option<String>,

    /// Ceiling on the subtask sequence length
    #[arg(long, default_value_t = 15)]
    max_tasks: usize,

    /// SQLite state file (state is in-memory when omitted)
    #[arg(long)]
    state_db: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct TaskFormatArg(TaskFormat);

impl std::str::FromStr for TaskFormatArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(TaskFormatArg)
    }
}

fn stub_worker() -> Arc<dyn Worker> {
    Arc::new(FnWorker::new(|req| {
        Ok(WorkerResponse::Structured(json!({
            "task_id": req.task_id,
            "status": "done",
            "output": format!("completed {}", req.task_id),
            "summary": "ok",
        })))
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.tasks.is_empty() {
        anyhow::bail!("no subtasks given; pass at least one --task \"title: description\"");
    }

    let worker: Arc<dyn Worker> = match &args.worker {
        Some(command) => Arc::new(CommandWorker::new(command)),
        None => stub_worker(),
    };

    let mut state: Box<dyn StateStore> = match &args.state_db {
        Some(path) => Box::new(SqliteStateStore::open(path.clone())?),
        None => Box::new(MemoryStateStore::new()),
    };

    let scope = StateScope::new("planner-cli", Uuid::new_v4().to_string());
    let config = ManagerConfig::new("planner", args.max_tasks).with_format(args.format.0);
    let manager = TaskManager::new(config, scope, worker);

    println!("═══ Seeding {} subtask(s) ═══", args.tasks.len());
    for task in &args.tasks {
        let (title, description) = match task.split_once(':') {
            Some((title, description)) => (title.trim(), description.trim()),
            None => (task.trim(), task.trim()),
        };
        let added = manager.add_subtask(state.as_mut(), title, description)?;
        println!("  + [{}] {}", added.task_id, added.title);
    }

    println!("═══ Executing ═══");
    loop {
        match manager.execute_current_subtask(state.as_mut()).await {
            Ok(outcome) => {
                println!(
                    "  [{}] {} - {}",
                    outcome.record.task_id, outcome.record.status, outcome.record.summary
                );
                if let Some(error) = &outcome.error {
                    println!("    ⚠ {error}");
                    break;
                }
                if outcome.action == NO_ACTIVE_SUBTASKS_MSG {
                    break;
                }
                if outcome.record.status == subtask_manager::TaskStatus::Incomplete {
                    println!("    ⚠ {}", outcome.action);
                    break;
                }
            }
            Err(err) => {
                println!("  {err}");
                break;
            }
        }
    }

    println!("═══ Records ═══");
    for record in manager.records(state.as_ref()) {
        println!(
            "  [{}] {} - output: {}",
            record.task_id, record.status, record.output
        );
    }

    Ok(())
}
