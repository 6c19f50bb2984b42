// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! orchestrad: background process that owns the reconciliation engine and
//! worker lifecycle for one repository, and exposes them over a Unix
//! socket for a dashboard process to drive (spec §6a).

use std::path::PathBuf;
use std::sync::Arc;

use orchestra_adapters::{GitOps, RealPlatform, TmuxAdapter};
use orchestra_core::id::{IdGen, UuidIdGen};
use orchestra_daemon::{Config, Daemon};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Some(arg) = std::env::args().nth(1) {
        if arg == "--version" || arg == "-V" {
            println!("orchestrad {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    }

    let config = Config::load()?;
    let _log_guard = orchestra_daemon::logging::init(&config)?;
    info!(state_dir = %config.state_dir.display(), "starting orchestrad");

    let repo_path = std::env::args()
        .nth(1)
        .filter(|a| !a.starts_with('-'))
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().expect("current directory must be resolvable"));
    let assistant_command = std::env::var("ORCHESTRA_ASSISTANT_COMMAND").unwrap_or_else(|_| "claude".to_string());

    if !GitOps::new().is_repo(&repo_path).await {
        anyhow::bail!("{} is not a git repository", repo_path.display());
    }

    let id_gen: Arc<dyn IdGen> = Arc::new(UuidIdGen);
    let daemon = Arc::new(
        Daemon::startup(
            &config,
            RealPlatform::new(),
            TmuxAdapter::new(),
            id_gen,
            repo_path,
            assistant_command.clone(),
            None,
        )
        .await,
    );
    daemon.start();

    let cancel = CancellationToken::new();
    let listener_cancel = cancel.clone();
    let listener_daemon = daemon.clone();
    let socket_path = config.socket_path.clone();
    let listener_handle = tokio::spawn(async move {
        orchestra_daemon::listener::serve(&socket_path, listener_daemon, assistant_command, listener_cancel).await
    });

    info!(socket = %config.socket_path.display(), "orchestrad ready");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    daemon.stop();
    cancel.cancel();
    let _ = listener_handle.await;
    info!("orchestrad stopped");
    Ok(())
}
