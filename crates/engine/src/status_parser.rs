// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `StatusParser`: reads the most recent hook-emitted status file for a
//! worker and maps it to a [`WorkerStatus`] (spec §4.5).
//!
//! The coding assistant writes one file per hook firing into
//! `<worktree>/.orchestra/status/`; the parser always reads the file with
//! the newest mtime (hooks fire in order, but a slow write on an older file
//! should never resurrect a stale status). Two payload shapes are
//! supported: structured JSON from modern hooks (`tool_name` +
//! `tool_input.command`/`tool_input.file_path` for an approval gate,
//! `event_type` for the rest of the hook lifecycle, or a bare `session_id`),
//! and a plaintext legacy fallback (`working`/`waiting`/`stopped`,
//! case-insensitive) from older hook scripts still in the wild.

use orchestra_adapters::platform::Platform;
use orchestra_core::WorkerStatus;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const STATUS_DIR_RELATIVE: &str = ".orchestra/status";

/// The hook's JSON payload shape, when present.
#[derive(Debug, Deserialize)]
struct HookPayload {
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    tool_input: Option<ToolInput>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    event_type: Option<HookEventType>,
}

/// `tool_input`'s recognized sub-fields, keyed by tool.
#[derive(Debug, Default, Deserialize)]
struct ToolInput {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
}

/// Lifecycle markers a hook can report independently of an approval gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
enum HookEventType {
    UserPromptSubmit,
    PermissionRequest,
    Stop,
    SessionEnd,
}

/// Parsed result of the most recent status file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStatus {
    pub status: WorkerStatus,
    pub pending_approval: Option<String>,
}

pub struct StatusParser<P: Platform> {
    platform: P,
}

impl<P: Platform> StatusParser<P> {
    pub fn new(platform: P) -> Self {
        Self { platform }
    }

    fn status_dir(worktree_path: &Path) -> PathBuf {
        worktree_path.join(STATUS_DIR_RELATIVE)
    }

    /// Read the newest-mtime file in the worktree's status directory and
    /// parse it. Returns `None` when there is no status directory or it's
    /// empty — callers should leave the worker's current status untouched
    /// in that case, not treat it as an error.
    pub async fn parse(&self, worktree_path: &Path) -> Option<ParsedStatus> {
        let dir = Self::status_dir(worktree_path);
        let entries = self.platform.read_dir(&dir).await.ok()?;
        if entries.is_empty() {
            return None;
        }

        let mut newest: Option<(u64, PathBuf)> = None;
        for entry in entries {
            let stat = self.platform.stat(&entry).await.ok()?;
            let is_newer = match &newest {
                Some((mtime, _)) => stat.mtime_epoch_ms > *mtime,
                None => true,
            };
            if is_newer {
                newest = Some((stat.mtime_epoch_ms, entry));
            }
        }
        let (_, path) = newest?;
        let raw = self.platform.read(&path).await.ok()?;
        Some(parse_payload(&raw))
    }
}

/// Pull the approval-gate context out of `tool_input` for the tools that
/// carry one: `command` for Bash, `file_path` for Write/Edit. Any other
/// tool has no recognized context field and gets the empty string.
fn tool_context(tool: &str, tool_input: Option<&ToolInput>) -> String {
    let Some(input) = tool_input else { return String::new() };
    match tool {
        "Bash" => input.command.clone(),
        "Write" | "Edit" => input.file_path.clone(),
        _ => None,
    }
    .unwrap_or_default()
}

fn parse_payload(raw: &str) -> ParsedStatus {
    let trimmed = raw.trim();
    if let Ok(payload) = serde_json::from_str::<HookPayload>(trimmed) {
        if let Some(tool) = &payload.tool_name {
            let context = tool_context(tool, payload.tool_input.as_ref());
            let description = if context.is_empty() {
                tool.clone()
            } else {
                format!("{tool}: {context}")
            };
            return ParsedStatus {
                status: WorkerStatus::WaitingApproval,
                pending_approval: Some(description),
            };
        }
        match payload.event_type {
            // Mirrors the PermissionRequest/tool_name pairing hooks send in
            // practice; with no tool_name to build a description from, this
            // falls back to a generic approval gate.
            Some(HookEventType::PermissionRequest) => {
                return ParsedStatus {
                    status: WorkerStatus::WaitingApproval,
                    pending_approval: Some("approval requested".to_string()),
                };
            }
            Some(HookEventType::UserPromptSubmit) => {
                return ParsedStatus {
                    status: WorkerStatus::Working,
                    pending_approval: None,
                };
            }
            Some(HookEventType::Stop) | Some(HookEventType::SessionEnd) => {
                return ParsedStatus {
                    status: WorkerStatus::Idle,
                    pending_approval: None,
                };
            }
            None => {}
        }
        if payload.session_id.is_some() {
            return ParsedStatus {
                status: WorkerStatus::Working,
                pending_approval: None,
            };
        }
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "working" => ParsedStatus {
            status: WorkerStatus::Working,
            pending_approval: None,
        },
        "waiting" => ParsedStatus {
            status: WorkerStatus::WaitingInput,
            pending_approval: None,
        },
        "stopped" => ParsedStatus {
            status: WorkerStatus::Stopped,
            pending_approval: None,
        },
        _ => ParsedStatus {
            status: WorkerStatus::Idle,
            pending_approval: None,
        },
    }
}

#[cfg(test)]
#[path = "status_parser_tests.rs"]
mod tests;
