// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file: {0}")]
	Io(#[from] std::io::Error),

	#[error("failed to parse config file: {0}")]
	Parse(#[from] toml::de::Error),
}

/// Client configuration. Defaults cover local development; a TOML file at
/// `~/.config/reef/config.toml` overrides the defaults, and environment
/// variables override the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Remote authority address, `host:port`.
	pub server_addr: String,
	pub auth_token: Option<String>,
	/// Replica root; defaults to the XDG data directory.
	pub data_dir: Option<PathBuf>,
	pub connect_timeout_ms: u64,
	pub request_timeout_ms: u64,
	pub write_debounce_ms: u64,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			server_addr: "127.0.0.1:4444".to_string(),
			auth_token: None,
			data_dir: None,
			connect_timeout_ms: 10_000,
			request_timeout_ms: 30_000,
			write_debounce_ms: 1_000,
		}
	}
}

impl ClientConfig {
	/// Defaults → config file (if present) → environment.
	pub fn load() -> Result<Self, ConfigError> {
		let mut config = match Self::config_path() {
			Some(path) if path.exists() => {
				debug!(path = %path.display(), "loading config file");
				let contents = std::fs::read_to_string(&path)?;
				toml::from_str(&contents)?
			}
			_ => Self::default(),
		};
		config.apply_env();
		Ok(config)
	}

	fn config_path() -> Option<PathBuf> {
		Some(dirs::config_dir()?.join("reef").join("config.toml"))
	}

	fn apply_env(&mut self) {
		if let Ok(addr) = std::env::var("REEF_SERVER_ADDR") {
			self.server_addr = addr;
		}
		if let Ok(token) = std::env::var("REEF_AUTH_TOKEN") {
			self.auth_token = Some(token);
		}
		if let Ok(dir) = std::env::var("REEF_DATA_DIR") {
			self.data_dir = Some(PathBuf::from(dir));
		}
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_millis(self.connect_timeout_ms)
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	pub fn write_debounce(&self) -> Duration {
		Duration::from_millis(self.write_debounce_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_sane() {
		let config = ClientConfig::default();
		assert_eq!(config.server_addr, "127.0.0.1:4444");
		assert!(config.auth_token.is_none());
		assert_eq!(config.write_debounce(), Duration::from_millis(1_000));
	}

	#[test]
	fn partial_file_keeps_remaining_defaults() {
		let config: ClientConfig =
			toml::from_str("server_addr = \"reef.example.org:9000\"").expect("parse");
		assert_eq!(config.server_addr, "reef.example.org:9000");
		assert_eq!(config.request_timeout(), Duration::from_millis(30_000));
	}

	#[test]
	fn environment_overrides_file_values() {
		std::env::set_var("REEF_SERVER_ADDR", "10.0.0.1:5555");
		std::env::set_var("REEF_AUTH_TOKEN", "tkn");

		let mut config: ClientConfig =
			toml::from_str("server_addr = \"reef.example.org:9000\"").expect("parse");
		config.apply_env();

		assert_eq!(config.server_addr, "10.0.0.1:5555");
		assert_eq!(config.auth_token.as_deref(), Some("tkn"));

		std::env::remove_var("REEF_SERVER_ADDR");
		std::env::remove_var("REEF_AUTH_TOKEN");
	}
}
