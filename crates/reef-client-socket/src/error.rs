// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SocketError {
	#[error("transport error: {0}")]
	Transport(String),

	#[error("request timed out")]
	Timeout,

	#[error("session is not authenticated")]
	Auth,

	#[error("remote error: {code}: {message}")]
	Remote {
		code: String,
		message: String,
		data: Option<Value>,
	},

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl SocketError {
	/// The remote rejection code, when this error is a server rejection.
	pub fn remote_code(&self) -> Option<&str> {
		match self {
			Self::Remote { code, .. } => Some(code),
			_ => None,
		}
	}
}
