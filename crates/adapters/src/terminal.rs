// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `TerminalSessionManager`: the higher-level broker workers go through to
//! get a terminal, wrapping a bare [`SessionAdapter`] with the naming,
//! idempotency, and aliasing rules of spec §4.7.

use crate::session::{SessionAdapter, SessionError};
use crate::subprocess::CONTAINER_OP_TIMEOUT;
use std::path::Path;
#[cfg(test)]
use std::time::Duration;

/// Manages terminal sessions for workers, keyed by a deterministic name
/// derived from the worker's session id.
#[derive(Clone)]
pub struct TerminalSessionManager<S: SessionAdapter> {
    adapter: S,
    prefix: String,
}

impl<S: SessionAdapter> TerminalSessionManager<S> {
    pub fn new(adapter: S, prefix: impl Into<String>) -> Self {
        Self {
            adapter,
            prefix: prefix.into(),
        }
    }

    /// `<prefix>-<first 12 hex chars of session_id without dashes>`.
    pub fn session_name(&self, session_id: &str) -> String {
        let compact: String = session_id.chars().filter(|c| *c != '-').collect();
        let short: String = compact.chars().take(12).collect();
        format!("{}-{}", self.prefix, short)
    }

    pub async fn exists(&self, session_name: &str) -> Result<bool, SessionError> {
        self.adapter.is_alive(session_name).await
    }

    /// Create a detached session if one doesn't already exist; returns the
    /// session name either way.
    pub async fn create_detached(
        &self,
        session_id: &str,
        cwd: &Path,
        cmd: &str,
        env: &[(String, String)],
    ) -> Result<(String, bool), SessionError> {
        let name = self.session_name(session_id);
        if self.exists(&name).await? {
            return Ok((name, false));
        }
        self.adapter.spawn(&name, cwd, cmd, env).await?;
        Ok((name, true))
    }

    pub async fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        self.adapter.list_sessions(&self.prefix).await
    }

    pub async fn kill(&self, session_name: &str) -> Result<(), SessionError> {
        self.adapter.kill(session_name).await
    }

    /// Send text to a session, shell-escaped with single quotes, optionally
    /// followed by Enter.
    pub async fn send_text(
        &self,
        session_name: &str,
        text: &str,
        press_enter: bool,
    ) -> Result<(), SessionError> {
        self.adapter.send_literal(session_name, text).await?;
        if press_enter {
            self.adapter.send_enter(session_name).await?;
        }
        Ok(())
    }

    /// Wire the `oo` alias inside `session_name` to invoke `command` with
    /// the worker's session id, so the assistant can call back into the
    /// orchestrator without knowing its own id ahead of time.
    pub async fn setup_alias(
        &self,
        session_name: &str,
        command: &str,
        session_id: &str,
    ) -> Result<(), SessionError> {
        let invocation = format!("{command} --session-id \"{session_id}\"");
        let alias = format!("alias oo={}", shell_escape_single_quoted(&invocation));
        self.send_text(session_name, &alias, true).await
    }

    /// Run `op` with the 2-second wall-clock ceiling container-mirrored
    /// operations observe (spec §4.7).
    pub async fn container_op<F, T>(&self, op: F) -> Result<T, SessionError>
    where
        F: std::future::Future<Output = Result<T, SessionError>>,
    {
        match tokio::time::timeout(CONTAINER_OP_TIMEOUT, op).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::CommandFailed(format!(
                "container operation exceeded {:?}",
                CONTAINER_OP_TIMEOUT
            ))),
        }
    }

    pub async fn container_send_text(
        &self,
        session_name: &str,
        text: &str,
        press_enter: bool,
    ) -> Result<(), SessionError> {
        self.container_op(self.send_text(session_name, text, press_enter))
            .await
    }

    pub async fn container_kill(&self, session_name: &str) -> Result<(), SessionError> {
        self.container_op(self.kill(session_name)).await
    }
}

/// Escape `text` for safe embedding inside single-quoted shell text, per
/// the usual `'...'\''...'` trick.
pub fn shell_escape_single_quoted(text: &str) -> String {
    format!("'{}'", text.replace('\'', r#"'\''"#))
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
