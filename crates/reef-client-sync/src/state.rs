// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

/// Per-file sync lifecycle. `Conflict` is terminal until an explicit
/// resolution; every other state yields to the next edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileSyncState {
	#[default]
	Clean,
	Dirty,
	Syncing,
	Conflict,
}

/// Events that drive the per-file state machine. The closed set keeps the
/// transition function exhaustive: a new lifecycle event has to be added
/// here and handled below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
	Edit,
	FlushStarted,
	FlushSucceeded,
	FlushFailed,
	RemoteRejected,
	Resolved,
}

impl FileSyncState {
	pub fn apply(self, command: SyncCommand) -> Self {
		use FileSyncState::*;
		use SyncCommand::*;

		match (self, command) {
			(Conflict, Resolved) => Clean,
			// Terminal until resolution: buffered edits and flush results
			// cannot move a conflicted file.
			(Conflict, _) => Conflict,
			(_, Edit) => Dirty,
			(Dirty, FlushStarted) => Syncing,
			(Syncing, FlushSucceeded) => Clean,
			(Syncing, FlushFailed) => Dirty,
			(Syncing, RemoteRejected) => Conflict,
			(state, _) => state,
		}
	}
}
