// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-domain-socket command listener (spec §6a).
//!
//! Demonstrates how an external dashboard process drives the engine; it is
//! explicitly the thinnest possible shim — no protocol versioning, no
//! batching, no backpressure. One newline-delimited JSON request in, one
//! newline-delimited JSON response out, per connection.

use crate::daemon::Daemon;
use orchestra_adapters::platform::Platform;
use orchestra_adapters::session::SessionAdapter;
use orchestra_core::{Worker, WorkerId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

/// One request read off the socket (spec §6's command catalog).
#[derive(Debug, Deserialize)]
#[serde(tag = "command")]
pub enum Command {
    #[serde(rename = "command:create_workers")]
    CreateWorkers {
        count: usize,
        #[serde(default)]
        container_ref: Option<String>,
    },
    #[serde(rename = "command:delete_worker")]
    DeleteWorker { id: u64 },
    #[serde(rename = "command:rename_worker")]
    RenameWorker { id: u64, new_name: String },
    #[serde(rename = "command:start_assistant")]
    StartAssistant { id: u64 },
    #[serde(rename = "command:send_to_worker")]
    SendToWorker { id: u64, text: String },
    #[serde(rename = "command:focus_worker")]
    FocusWorker { id: u64 },
    #[serde(rename = "command:change_container")]
    ChangeContainer { id: u64, container_ref: String },
    #[serde(rename = "command:cleanup")]
    Cleanup,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Ok { ok: bool },
    Workers { ok: bool, workers: Vec<Worker> },
    Worker { ok: bool, worker: Worker },
    Focus { ok: bool, session_name: String },
    Cleaned { ok: bool, removed: Vec<WorkerId> },
    Err { ok: bool, error: String },
}

fn ok() -> Response {
    Response::Ok { ok: true }
}

fn err(message: impl ToString) -> Response {
    Response::Err {
        ok: false,
        error: message.to_string(),
    }
}

/// Accepts connections on `socket_path` until `cancel` fires, handling
/// each on its own task so one slow client can't stall the rest.
pub async fn serve<P, S>(
    socket_path: &Path,
    daemon: Arc<Daemon<P, S>>,
    assistant_command: String,
    cancel: CancellationToken,
) -> std::io::Result<()>
where
    P: Platform,
    S: SessionAdapter,
{
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)?;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let daemon = daemon.clone();
                let assistant_command = assistant_command.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &daemon, &assistant_command).await {
                        tracing::warn!(error = %e, "command connection ended with an error");
                    }
                });
            }
        }
    }
}

async fn handle_connection<P, S>(
    stream: UnixStream,
    daemon: &Daemon<P, S>,
    assistant_command: &str,
) -> std::io::Result<()>
where
    P: Platform,
    S: SessionAdapter,
{
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Command>(&line) {
            Ok(command) => dispatch(daemon, command, assistant_command).await,
            Err(e) => err(format!("invalid command payload: {e}")),
        };
        let mut serialized = serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"ok":false,"error":"failed to serialize response"}"#.to_string()
        });
        serialized.push('\n');
        write_half.write_all(serialized.as_bytes()).await?;
    }
    Ok(())
}

async fn dispatch<P, S>(daemon: &Daemon<P, S>, command: Command, assistant_command: &str) -> Response
where
    P: Platform,
    S: SessionAdapter,
{
    match command {
        Command::CreateWorkers { count, container_ref } => {
            match daemon.create_workers(count, container_ref).await {
                Ok(workers) => Response::Workers { ok: true, workers },
                Err(e) => err(e),
            }
        }
        Command::DeleteWorker { id } => match daemon.delete_worker(WorkerId(id)).await {
            Ok(()) => ok(),
            Err(e) => err(e),
        },
        Command::RenameWorker { id, new_name } => match daemon.rename_worker(WorkerId(id), new_name).await {
            Ok(worker) => Response::Worker { ok: true, worker },
            Err(e) => err(e),
        },
        Command::StartAssistant { id } => match daemon.start_assistant(WorkerId(id), assistant_command).await {
            Ok(()) => ok(),
            Err(e) => err(e),
        },
        Command::SendToWorker { id, text } => match daemon.send_to_worker(WorkerId(id), &text, true).await {
            Ok(()) => ok(),
            Err(e) => err(e),
        },
        Command::FocusWorker { id } => match daemon.focus_worker(WorkerId(id)).await {
            Ok(session_name) => Response::Focus { ok: true, session_name },
            Err(e) => err(e),
        },
        Command::ChangeContainer { id, container_ref } => {
            match daemon.change_container(WorkerId(id), container_ref).await {
                Ok(worker) => Response::Worker { ok: true, worker },
                Err(e) => err(e),
            }
        }
        Command::Cleanup => match daemon.cleanup().await {
            Ok(removed) => Response::Cleaned { ok: true, removed },
            Err(e) => err(e),
        },
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
