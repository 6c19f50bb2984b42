// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Platform` adapter: filesystem, process execution, and path
//! translation, behind one capability set (spec §6).
//!
//! The core (GitOps, WorktreeStore) never touches `std::fs` or
//! `std::process` directly — it goes through this trait, so tests can swap
//! in [`FakePlatform`] without touching a real filesystem.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where a path string is headed: local filesystem calls, a shell command
/// string, or text shown to a person. [`Worker`] stores a single `fs`-form
/// `PathBuf`; the other two forms are derived on demand by
/// [`Platform::convert_path`], never stored.
///
/// [`Worker`]: orchestra_core::Worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathContext {
    Fs,
    Terminal,
    Display,
}

/// File metadata as reported by `stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub mtime_epoch_ms: u64,
    pub is_dir: bool,
    pub is_file: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("exec failed: {0}")]
    ExecFailed(String),
    #[error("exec timed out: {0}")]
    ExecTimeout(String),
}

/// Filesystem, process, and path-translation capability set.
#[async_trait]
pub trait Platform: Clone + Send + Sync + 'static {
    fn platform(&self) -> &'static str;
    fn is_wsl(&self) -> bool;
    fn temp_dir(&self) -> PathBuf;
    fn home_dir(&self) -> Option<PathBuf>;

    fn join_path(&self, base: &Path, segment: &str) -> PathBuf {
        base.join(segment)
    }

    /// Render `p` for the given consumption context. The default platform
    /// uses the same string for all three; WSL/Windows adapters translate.
    fn convert_path(&self, p: &Path, _context: PathContext) -> String {
        p.display().to_string()
    }

    async fn exec(&self, cmd: &str, args: &[&str], cwd: &Path) -> Result<String, PlatformError>;

    fn exists(&self, path: &Path) -> bool;
    async fn read(&self, path: &Path) -> Result<String, PlatformError>;
    async fn write(&self, path: &Path, contents: &str) -> Result<(), PlatformError>;

    /// Write via a temporary sibling file and rename, so readers never see
    /// a partially-written file (spec §4.4's atomic-write requirement).
    async fn atomic_write(&self, path: &Path, contents: &str) -> Result<(), PlatformError>;

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, PlatformError>;
    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<(), PlatformError>;
    async fn copy_dir_recursive(&self, from: &Path, to: &Path) -> Result<(), PlatformError>;
    async fn unlink(&self, path: &Path) -> Result<(), PlatformError>;
    async fn rmdir(&self, path: &Path, recursive: bool) -> Result<(), PlatformError>;
    async fn stat(&self, path: &Path) -> Result<Stat, PlatformError>;
}

/// The real, OS-backed [`Platform`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RealPlatform;

impl RealPlatform {
    pub fn new() -> Self {
        Self
    }
}

fn to_io_err(path: &Path, e: std::io::Error) -> PlatformError {
    PlatformError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl Platform for RealPlatform {
    fn platform(&self) -> &'static str {
        std::env::consts::OS
    }

    fn is_wsl(&self) -> bool {
        std::env::var("WSL_DISTRO_NAME").is_ok()
    }

    fn temp_dir(&self) -> PathBuf {
        std::env::temp_dir()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    async fn exec(&self, cmd: &str, args: &[&str], cwd: &Path) -> Result<String, PlatformError> {
        let mut command = tokio::process::Command::new(cmd);
        command.args(args).current_dir(cwd);
        let output = command
            .output()
            .await
            .map_err(|e| PlatformError::ExecFailed(e.to_string()))?;
        if !output.status.success() {
            return Err(PlatformError::ExecFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn read(&self, path: &Path) -> Result<String, PlatformError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| to_io_err(path, e))
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<(), PlatformError> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| to_io_err(path, e))
    }

    async fn atomic_write(&self, path: &Path, contents: &str) -> Result<(), PlatformError> {
        let tmp = path.with_extension(match path.extension() {
            Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
            None => "tmp".to_string(),
        });
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| to_io_err(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| to_io_err(path, e))
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, PlatformError> {
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| to_io_err(path, e))?;
        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| to_io_err(path, e))?
        {
            out.push(entry.path());
        }
        Ok(out)
    }

    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<(), PlatformError> {
        let result = if recursive {
            tokio::fs::create_dir_all(path).await
        } else {
            tokio::fs::create_dir(path).await
        };
        result.map_err(|e| to_io_err(path, e))
    }

    async fn copy_dir_recursive(&self, from: &Path, to: &Path) -> Result<(), PlatformError> {
        copy_dir_recursive_impl(from, to).await
    }

    async fn unlink(&self, path: &Path) -> Result<(), PlatformError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| to_io_err(path, e))
    }

    async fn rmdir(&self, path: &Path, recursive: bool) -> Result<(), PlatformError> {
        let result = if recursive {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_dir(path).await
        };
        result.map_err(|e| to_io_err(path, e))
    }

    async fn stat(&self, path: &Path) -> Result<Stat, PlatformError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| to_io_err(path, e))?;
        let mtime_epoch_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(Stat {
            mtime_epoch_ms,
            is_dir: meta.is_dir(),
            is_file: meta.is_file(),
        })
    }
}

fn copy_dir_recursive_impl<'a>(
    from: &'a Path,
    to: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), PlatformError>> + Send + 'a>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(to)
            .await
            .map_err(|e| to_io_err(to, e))?;
        let mut entries = tokio::fs::read_dir(from)
            .await
            .map_err(|e| to_io_err(from, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| to_io_err(from, e))?
        {
            let src = entry.path();
            let dst = to.join(entry.file_name());
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| to_io_err(&src, e))?;
            if file_type.is_dir() {
                copy_dir_recursive_impl(&src, &dst).await?;
            } else {
                tokio::fs::copy(&src, &dst)
                    .await
                    .map_err(|e| to_io_err(&src, e))?;
            }
        }
        Ok(())
    })
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakePlatform;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// In-memory [`Platform`] for tests: files live in a `BTreeMap`, no real
    /// I/O, `exec` results are pre-programmed per `(cmd, args)` key.
    #[derive(Clone, Default)]
    pub struct FakePlatform {
        files: Arc<Mutex<BTreeMap<PathBuf, String>>>,
        mtimes: Arc<Mutex<BTreeMap<PathBuf, u64>>>,
        exec_results: Arc<Mutex<BTreeMap<String, Result<String, String>>>>,
    }

    impl FakePlatform {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn set_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
            self.files.lock().await.insert(path.into(), contents.into());
        }

        pub async fn file(&self, path: &Path) -> Option<String> {
            self.files.lock().await.get(path).cloned()
        }

        pub async fn set_mtime(&self, path: impl Into<PathBuf>, mtime_epoch_ms: u64) {
            self.mtimes.lock().await.insert(path.into(), mtime_epoch_ms);
        }

        pub async fn set_exec_result(&self, key: impl Into<String>, result: Result<String, String>) {
            self.exec_results.lock().await.insert(key.into(), result);
        }

        fn exec_key(cmd: &str, args: &[&str]) -> String {
            format!("{cmd} {}", args.join(" "))
        }
    }

    #[async_trait]
    impl Platform for FakePlatform {
        fn platform(&self) -> &'static str {
            "fake"
        }

        fn is_wsl(&self) -> bool {
            false
        }

        fn temp_dir(&self) -> PathBuf {
            PathBuf::from("/tmp")
        }

        fn home_dir(&self) -> Option<PathBuf> {
            Some(PathBuf::from("/home/fake"))
        }

        async fn exec(&self, cmd: &str, args: &[&str], _cwd: &Path) -> Result<String, PlatformError> {
            let key = Self::exec_key(cmd, args);
            match self.exec_results.lock().await.get(&key) {
                Some(Ok(out)) => Ok(out.clone()),
                Some(Err(msg)) => Err(PlatformError::ExecFailed(msg.clone())),
                None => Ok(String::new()),
            }
        }

        fn exists(&self, path: &Path) -> bool {
            self.files
                .try_lock()
                .map(|f| f.contains_key(path))
                .unwrap_or(false)
        }

        async fn read(&self, path: &Path) -> Result<String, PlatformError> {
            self.files
                .lock()
                .await
                .get(path)
                .cloned()
                .ok_or_else(|| PlatformError::NotFound(path.display().to_string()))
        }

        async fn write(&self, path: &Path, contents: &str) -> Result<(), PlatformError> {
            self.files
                .lock()
                .await
                .insert(path.to_path_buf(), contents.to_string());
            Ok(())
        }

        async fn atomic_write(&self, path: &Path, contents: &str) -> Result<(), PlatformError> {
            self.write(path, contents).await
        }

        async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, PlatformError> {
            let files = self.files.lock().await;
            let mut children = std::collections::BTreeSet::new();
            for key in files.keys() {
                if let Ok(rel) = key.strip_prefix(path) {
                    if let Some(first) = rel.components().next() {
                        children.insert(path.join(first));
                    }
                }
            }
            Ok(children.into_iter().collect())
        }

        async fn mkdir(&self, _path: &Path, _recursive: bool) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn copy_dir_recursive(&self, _from: &Path, _to: &Path) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn unlink(&self, path: &Path) -> Result<(), PlatformError> {
            self.files.lock().await.remove(path);
            Ok(())
        }

        async fn rmdir(&self, path: &Path, recursive: bool) -> Result<(), PlatformError> {
            let mut files = self.files.lock().await;
            if recursive {
                files.retain(|p, _| !p.starts_with(path));
            } else {
                files.remove(path);
            }
            Ok(())
        }

        async fn stat(&self, path: &Path) -> Result<Stat, PlatformError> {
            if self.files.lock().await.contains_key(path) {
                let mtime_epoch_ms = self.mtimes.lock().await.get(path).copied().unwrap_or(0);
                Ok(Stat {
                    mtime_epoch_ms,
                    is_dir: false,
                    is_file: true,
                })
            } else {
                Err(PlatformError::NotFound(path.display().to_string()))
            }
        }
    }
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
