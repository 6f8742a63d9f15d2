// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use reef_client_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ClientError {
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("store error: {0}")]
	Store(#[from] StoreError),
}
