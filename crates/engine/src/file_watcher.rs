// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hybrid native + poll file watcher (spec §4.2).
//!
//! Bounds worst-case staleness two ways at once: a native `notify` watcher
//! reacts to filesystem events immediately, and a backup poll fires on a
//! fixed interval regardless of whether native events are flowing, so a
//! watcher that silently stops delivering (a known failure mode on some
//! platforms/mounts) never stalls reconciliation for longer than one poll
//! interval. Bursts of native events are debounced: a change schedules a
//! tick after `debounce_ms` of quiet rather than firing once per event.

use notify::{Event as NotifyEvent, RecommendedWatcher, RecursiveMode, Watcher};
use orchestra_core::Clock;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchTrigger {
    /// A debounced native filesystem change.
    Change,
    /// The unconditional backup poll tick.
    Poll,
}

pub struct FileWatcherConfig {
    pub poll_interval: Duration,
    pub debounce: Duration,
    pub health_check_interval: Duration,
}

impl Default for FileWatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            debounce: Duration::from_millis(100),
            health_check_interval: Duration::from_secs(60),
        }
    }
}

/// Watches one or more directories, emitting debounced native-change ticks
/// and unconditional backup-poll ticks to a single callback.
pub struct FileWatcher<C: Clock> {
    config: FileWatcherConfig,
    clock: C,
    last_event_time: Arc<Mutex<Instant>>,
    cancel: CancellationToken,
    _native_watcher: Option<RecommendedWatcher>,
}

impl<C: Clock> FileWatcher<C> {
    /// Start watching `paths` (each watched recursively), calling `on_tick`
    /// for every debounced change and every backup poll. Returns the handle
    /// immediately; the watch loop runs on a spawned task until `stop()`.
    pub fn start(
        paths: Vec<PathBuf>,
        exclude: Vec<String>,
        config: FileWatcherConfig,
        clock: C,
        on_tick: impl Fn(WatchTrigger) + Send + Sync + 'static,
    ) -> Self {
        let cancel = CancellationToken::new();
        let last_event_time = Arc::new(Mutex::new(clock.now()));

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let native_watcher = {
            let exclude = exclude.clone();
            let tx = tx.clone();
            create_native_watcher(&paths, exclude, tx)
        };

        let on_tick = Arc::new(on_tick);
        let debounce = config.debounce;
        let poll_interval = config.poll_interval;
        let loop_cancel = cancel.clone();
        let loop_last_event = last_event_time.clone();
        let loop_clock = clock.clone();

        tokio::spawn(async move {
            let mut debounce_deadline: Option<tokio::time::Instant> = None;
            let mut poll_interval_timer = tokio::time::interval(poll_interval);
            poll_interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                let debounce_sleep = async {
                    match debounce_deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    _ = poll_interval_timer.tick() => {
                        *loop_last_event.lock() = loop_clock.now();
                        on_tick(WatchTrigger::Poll);
                    }
                    received = rx.recv() => {
                        if received.is_none() {
                            continue;
                        }
                        debounce_deadline = Some(tokio::time::Instant::now() + debounce);
                    }
                    _ = debounce_sleep => {
                        debounce_deadline = None;
                        *loop_last_event.lock() = loop_clock.now();
                        on_tick(WatchTrigger::Change);
                    }
                }
            }
        });

        Self {
            config,
            clock,
            last_event_time,
            cancel,
            _native_watcher: native_watcher,
        }
    }

    /// Idempotent: cancels the watch loop, which drops pending debounced
    /// events and stops the backup poll.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Healthy if a tick (native or poll) has landed within
    /// `health_check_interval`. Since the backup poll always fires on
    /// schedule, this only ever trips if the watch loop itself has died.
    pub fn is_healthy(&self) -> bool {
        self.clock.now().duration_since(*self.last_event_time.lock()) <= self.config.health_check_interval
    }
}

impl<C: Clock> Drop for FileWatcher<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn create_native_watcher(
    paths: &[PathBuf],
    exclude: Vec<String>,
    tx: mpsc::UnboundedSender<()>,
) -> Option<RecommendedWatcher> {
    let handler = move |res: notify::Result<NotifyEvent>| {
        let Ok(event) = res else {
            return;
        };
        let relevant = event.paths.iter().any(|p| !is_excluded(p, &exclude));
        if relevant {
            let _ = tx.send(());
        }
    };

    let mut watcher = match notify::recommended_watcher(handler) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "native file watcher unavailable, relying on backup polling");
            return None;
        }
    };

    for path in paths {
        if let Err(e) = watcher.watch(path, RecursiveMode::Recursive) {
            tracing::warn!(path = %path.display(), error = %e, "failed to watch path, relying on backup polling for it");
        }
    }

    Some(watcher)
}

fn is_excluded(path: &Path, exclude: &[String]) -> bool {
    let s = path.to_string_lossy();
    exclude.iter().any(|pattern| s.contains(pattern.as_str()))
}

#[cfg(test)]
#[path = "file_watcher_tests.rs"]
mod tests;
