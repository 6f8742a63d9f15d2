// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Reconciles the local replica against the remote authority.
//!
//! The sync engine owns the per-file conflict state machine, the
//! single-slot debounced pending write for each file, and the
//! flush-before-switch discipline that keeps context changes lossless.
//! Conflicts are surfaced with both candidate versions and resolved only
//! by an explicit user choice, never merged automatically.

mod engine;
mod error;
mod state;

pub use engine::{
	Conflict, FlushOutcome, ProjectContext, QuestionContext, Resolution, SyncEngine,
};
pub use error::SyncError;
pub use state::{FileSyncState, SyncCommand};
