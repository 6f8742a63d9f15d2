// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use reef_client_socket::SocketError;
use reef_client_store::StoreError;
use thiserror::Error;

use crate::engine::Conflict;

#[derive(Debug, Error)]
pub enum SyncError {
	#[error("store error: {0}")]
	Store(#[from] StoreError),

	#[error("socket error: {0}")]
	Socket(#[from] SocketError),

	#[error("write conflict on {}", .0.path)]
	Conflict(Box<Conflict>),

	#[error("no conflict recorded for {0}")]
	NoConflict(String),

	#[error("malformed server response: {0}")]
	Protocol(String),
}
