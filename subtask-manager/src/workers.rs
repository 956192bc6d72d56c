//! Built-in workers: a process-spawning worker for real use and two simple
//! doubles for tests and demos.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Mutex;
use subtask_manager_sdk::{
    async_trait, StateStore, Worker, WorkerRequest, WorkerResponse, WorkerResult,
};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Worker that spawns a command per subtask, writes the rendered request to
/// its stdin and returns stdout as the response text.
///
/// This is the glue for CLI-driven agents: anything that reads a task
/// description and prints a result can act as the execution capability.
pub struct CommandWorker {
    program: String,
    args: Vec<String>,
}

impl CommandWorker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[async_trait]
impl Worker for CommandWorker {
    async fn run(
        &self,
        request: WorkerRequest,
        _state: &mut dyn StateStore,
    ) -> WorkerResult<WorkerResponse> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let payload = request.payload.into_text();
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(payload.as_bytes()).await?;
            // Dropping stdin closes the pipe so the child sees EOF.
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(format!("worker process exited with {}", output.status).into());
        }

        Ok(WorkerResponse::Text(
            String::from_utf8_lossy(&output.stdout).into_owned(),
        ))
    }
}

/// Test double that replays a queue of canned responses in order.
pub struct ScriptedWorker {
    responses: Mutex<VecDeque<WorkerResult<WorkerResponse>>>,
}

impl ScriptedWorker {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(WorkerResponse::Text(text.into())))
    }

    pub fn push_structured(self, value: serde_json::Value) -> Self {
        self.push(Ok(WorkerResponse::Structured(value)))
    }

    pub fn push_error(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into().into()))
    }

    fn push(self, response: WorkerResult<WorkerResponse>) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
        self
    }
}

impl Default for ScriptedWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    async fn run(
        &self,
        _request: WorkerRequest,
        _state: &mut dyn StateStore,
    ) -> WorkerResult<WorkerResponse> {
        let mut responses = self
            .responses
            .lock()
            .map_err(|_| "scripted worker lock poisoned")?;
        responses
            .pop_front()
            .unwrap_or_else(|| Err("scripted worker has no responses left".into()))
    }
}

/// Test double that computes its response from the incoming request, for
/// workers that need to echo the task id back.
pub struct FnWorker<F>
where
    F: Fn(&WorkerRequest) -> WorkerResult<WorkerResponse> + Send + Sync,
{
    f: F,
}

impl<F> FnWorker<F>
where
    F: Fn(&WorkerRequest) -> WorkerResult<WorkerResponse> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Worker for FnWorker<F>
where
    F: Fn(&WorkerRequest) -> WorkerResult<WorkerResponse> + Send + Sync,
{
    async fn run(
        &self,
        request: WorkerRequest,
        _state: &mut dyn StateStore,
    ) -> WorkerResult<WorkerResponse> {
        (self.f)(&request)
    }
}
