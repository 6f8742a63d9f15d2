// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use reef_client_compiler::CompilerFacade;
use reef_client_console::{ConsoleEvent, OutputAssembler};
use reef_client_socket::{Backoff, SocketClient, SocketConfig};
use reef_client_store::{default_contents, FileEntry, LocalStore, ProjectId};
use reef_client_sync::{SyncEngine, SyncError};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::report::ErrorReporter;

/// The client's component graph, constructed exactly once at startup and
/// passed to whoever needs it. UI collaborators call operations on the
/// parts and drain the returned console receiver for display updates.
pub struct Context {
	pub config: ClientConfig,
	pub store: Arc<LocalStore>,
	pub socket: SocketClient,
	pub sync: SyncEngine,
	pub console: Arc<OutputAssembler>,
	pub compiler: CompilerFacade,
	pub reporter: ErrorReporter,
}

impl Context {
	/// Build every component in dependency order. Must run inside a tokio
	/// runtime, since the socket client spawns its connection task
	/// immediately.
	pub fn init(
		config: ClientConfig,
	) -> Result<(Self, mpsc::UnboundedReceiver<ConsoleEvent>), ClientError> {
		let store = Arc::new(match &config.data_dir {
			Some(dir) => LocalStore::new(dir.clone()),
			None => LocalStore::from_xdg()?,
		});

		let socket = SocketClient::new(SocketConfig {
			addr: config.server_addr.clone(),
			token: config.auth_token.clone(),
			connect_timeout: config.connect_timeout(),
			request_timeout: config.request_timeout(),
			backoff: Backoff::default(),
		});

		let sync = SyncEngine::new(store.clone(), socket.clone())
			.with_debounce(config.write_debounce());

		let (console, console_rx) = OutputAssembler::new();
		let console = Arc::new(console);

		let compiler = CompilerFacade::new(sync.clone(), socket.clone(), console.clone());

		info!(server = %config.server_addr, "client context initialized");

		let context = Self {
			config,
			store,
			socket,
			sync,
			console,
			compiler,
			reporter: ErrorReporter::new(),
		};
		Ok((context, console_rx))
	}

	/// Create a file with the default template for its extension and open
	/// it in the question's editor set.
	pub async fn add_file(
		&self,
		project: &ProjectId,
		question: &str,
		name: &str,
	) -> Result<FileEntry, SyncError> {
		let path = format!("{question}/{name}");
		let entry = self
			.sync
			.create_file(project, &path, default_contents(&path))
			.await?;
		self.sync.open_file(project, question, &path).await?;
		Ok(entry)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn init_builds_the_component_graph() {
		let tmp = TempDir::new().unwrap();
		let config = ClientConfig {
			data_dir: Some(tmp.path().to_path_buf()),
			// Nothing listens here; construction must still succeed and
			// the socket keeps reconnecting in the background.
			server_addr: "127.0.0.1:1".to_string(),
			..ClientConfig::default()
		};

		let (context, _console_rx) = Context::init(config).expect("init");

		// The store is usable offline immediately.
		let project = context.store.create_project("A1").await.unwrap();
		assert_eq!(context.store.list_projects().await.unwrap().len(), 1);
		assert!(!context.socket.is_connected().await);
		drop(project);
	}
}
