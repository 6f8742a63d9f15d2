// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use reef_client_socket::SocketError;
use reef_client_sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompilerError {
	#[error("sync error: {0}")]
	Sync(#[from] SyncError),

	#[error("socket error: {0}")]
	Socket(#[from] SocketError),

	#[error("malformed server response: {0}")]
	Protocol(String),

	#[error("a run is already in progress")]
	Busy,

	#[error("grading poll cancelled")]
	PollCancelled,
}
