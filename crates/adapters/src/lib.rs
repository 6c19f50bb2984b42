// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! orchestra-adapters: the platform, Git, and terminal-multiplexer adapters
//! the engine consumes through narrow trait interfaces (spec §6).
//!
//! Nothing in this crate is aware of `Worker` or reconciliation; it only
//! exposes capability sets (`Platform`, `SessionAdapter`) and a couple of
//! small higher-level brokers (`GitOps`, `TerminalSessionManager`) built on
//! top of them.

pub mod gitops;
pub mod platform;
pub mod session;
pub mod subprocess;
pub mod terminal;
pub mod traced;

pub use gitops::{DiffStats, GitOps, GitOpsError};
pub use platform::{Platform, PlatformError, RealPlatform};
pub use session::{NoOpSessionAdapter, SessionAdapter, SessionError, TmuxAdapter};
pub use terminal::TerminalSessionManager;
pub use traced::TracedSession;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use platform::FakePlatform;
#[cfg(any(test, feature = "test-support"))]
pub use session::{FakeSession, FakeSessionAdapter, SessionCall};
