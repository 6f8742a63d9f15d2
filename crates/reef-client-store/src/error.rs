// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdError {
	#[error("invalid id prefix: expected '{expected}', got '{got}'")]
	InvalidPrefix { expected: &'static str, got: String },

	#[error("invalid UUID in id: {0}")]
	InvalidUuid(#[from] uuid::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("path already exists: {0}")]
	PathExists(String),
}
