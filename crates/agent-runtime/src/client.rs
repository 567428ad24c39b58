//! Worker client stub
//!
//! Spawns the tool server as a child process and talks to it over its
//! stdin/stdout, one JSON line each way.
//!
//! The child is owned by a single actor task. Each request is written and its
//! reply read inside that task, so a caller that gives up (turn timeout) only
//! drops its reply channel; the reply is still consumed and the stream stays
//! aligned for the next request. Dropping the client aborts the actor, which
//! kills the child.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use agent_core::protocol::{InitializeResult, Request, Response, WireToolSpec};
use agent_core::{AgentError, Arguments, Result, ToolDispatcher};

/// How to launch the worker
#[derive(Clone, Debug)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Extra environment on top of the inherited one
    pub env: Vec<(String, String)>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

struct Job {
    request: Request,
    reply: oneshot::Sender<Result<Value>>,
}

/// The child process and its pipes; lives inside the actor task
struct Connection {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Connection {
    fn spawn(command: &WorkerCommand) -> Result<Self> {
        tracing::info!(program = %command.program.display(), args = ?command.args, "spawning tool server");

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            AgentError::StartupFailure(format!(
                "failed to spawn {}: {e}",
                command.program.display()
            ))
        })?;

        let missing = || AgentError::StartupFailure("worker pipes were not captured".into());
        let stdin = child.stdin.take().ok_or_else(missing)?;
        let stdout = child.stdout.take().ok_or_else(missing)?;

        // Worker logs end up in ours.
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "tool_server", "{line}");
                }
            });
        }

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    async fn round_trip(&mut self, request: &Request) -> Result<Value> {
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        self.stdin.write_all(&line).await?;
        self.stdin.flush().await?;

        let mut reply = String::new();
        if self.stdout.read_line(&mut reply).await? == 0 {
            return Err(AgentError::Protocol("tool server closed its output".into()));
        }
        tracing::trace!(reply = %reply.trim_end(), "tool server reply");
        Ok(serde_json::from_str(reply.trim_end())?)
    }

    /// Close stdin and give the worker a moment to exit on its own.
    async fn close(self) {
        let Self {
            mut child, stdin, ..
        } = self;
        drop(stdin);
        match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
            Ok(Ok(status)) => tracing::info!(%status, "tool server exited"),
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to wait for tool server"),
            Err(_) => {
                tracing::warn!("tool server did not exit, killing it");
                let _ = child.kill().await;
            }
        }
    }
}

async fn run_actor(mut conn: Connection, mut jobs: mpsc::Receiver<Job>) {
    while let Some(job) = jobs.recv().await {
        let result = conn.round_trip(&job.request).await;
        let broken = result.is_err();
        if let Err(e) = &result {
            tracing::error!(error = %e, "tool server round trip failed");
        }
        if job.reply.send(result).is_err() {
            tracing::debug!("caller gone before the reply arrived");
        }
        if broken {
            // The stream can no longer be trusted to line up.
            break;
        }
    }
    conn.close().await;
}

/// Client for a spawned tool server
pub struct ToolServerClient {
    jobs: mpsc::Sender<Job>,
    actor: Option<JoinHandle<()>>,
    init: InitializeResult,
}

impl ToolServerClient {
    /// Spawn the worker and complete the `initialize` handshake within `connect_timeout`.
    pub async fn spawn(command: WorkerCommand, connect_timeout: Duration) -> Result<Self> {
        match tokio::time::timeout(connect_timeout, Self::connect(command)).await {
            Ok(Ok(client)) => Ok(client),
            Ok(Err(e @ AgentError::StartupFailure(_))) => Err(e),
            Ok(Err(e)) => Err(AgentError::StartupFailure(e.to_string())),
            Err(_) => Err(AgentError::StartupFailure(format!(
                "tool server did not initialize within {} seconds",
                connect_timeout.as_secs_f64()
            ))),
        }
    }

    async fn connect(command: WorkerCommand) -> Result<Self> {
        let conn = Connection::spawn(&command)?;
        let (jobs, rx) = mpsc::channel(16);
        let mut client = Self {
            jobs,
            actor: Some(tokio::spawn(run_actor(conn, rx))),
            init: InitializeResult::new(Vec::new()),
        };

        let reply = client.call(Request::initialize()).await?;
        if let Some(error) = reply.get("error").and_then(Value::as_str) {
            return Err(AgentError::StartupFailure(error.to_string()));
        }
        client.init = serde_json::from_value(reply)?;

        tracing::info!(
            schema_version = %client.init.schema_version,
            tools = client.init.tool_specs.len(),
            "tool server initialized"
        );
        Ok(client)
    }

    async fn call(&self, request: Request) -> Result<Value> {
        let gone = || AgentError::Protocol("tool server has exited".into());
        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job { request, reply })
            .await
            .map_err(|_| gone())?;
        rx.await.map_err(|_| gone())?
    }

    /// Tool specs announced by the worker
    pub fn tool_specs(&self) -> &[WireToolSpec] {
        &self.init.tool_specs
    }

    pub fn capabilities(&self) -> &[String] {
        &self.init.capabilities
    }

    pub fn schema_version(&self) -> &str {
        &self.init.schema_version
    }

    /// Close the worker's stdin and wait for it to exit.
    pub async fn shutdown(mut self) {
        let actor = self.actor.take();
        drop(self);
        if let Some(actor) = actor {
            let _ = actor.await;
        }
    }
}

impl Drop for ToolServerClient {
    fn drop(&mut self) {
        if let Some(actor) = self.actor.take() {
            actor.abort();
        }
    }
}

#[async_trait]
impl ToolDispatcher for ToolServerClient {
    async fn dispatch(&self, function_name: &str, parameters: Arguments) -> Result<Value> {
        tracing::debug!(function = %function_name, "forwarding to tool server");
        let params = Value::Object(parameters.into_iter().collect());
        let reply = self.call(Request::execute(function_name, params)).await?;
        let response: Response = serde_json::from_value(reply)?;
        response.into_result()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_a_startup_failure() {
        let err = ToolServerClient::spawn(
            WorkerCommand::new("/nonexistent/fs-tool-server"),
            Duration::from_secs(5),
        )
        .await
        .err()
        .unwrap();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_silent_worker_times_out() {
        let err = ToolServerClient::spawn(
            WorkerCommand::new("sleep").arg("5"),
            Duration::from_millis(200),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, AgentError::StartupFailure(_)));
    }

    #[tokio::test]
    async fn test_worker_that_exits_is_a_startup_failure() {
        let err = ToolServerClient::spawn(WorkerCommand::new("true"), Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }
}
