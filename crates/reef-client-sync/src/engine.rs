// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reef_client_socket::protocol::{
	Diagnostic, ERR_VERSION_CONFLICT, OP_FILE_CREATE, OP_FILE_DELETE, OP_FILE_RENAME,
	OP_FILE_WRITE, OP_PROJECT_CREATE, OP_PROJECT_DELETE, OP_PROJECT_RENAME,
};
use reef_client_socket::{SocketClient, SocketError};
use reef_client_store::{FileEntry, FileId, LocalStore, Project, ProjectId, StoreError};
use reef_common_task::Debounce;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::state::{FileSyncState, SyncCommand};

const WRITE_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Divergence between local and remote file state. Both candidates are
/// held in full so the user can choose with everything in front of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
	pub file_id: FileId,
	pub path: String,
	pub local_version: u64,
	pub remote_version: u64,
	pub local_contents: String,
	pub remote_contents: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
	KeepLocal,
	KeepRemote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
	/// Committed locally and acknowledged by the remote authority.
	Flushed(u64),
	/// Committed locally; remote sync deferred until the connection
	/// returns.
	Deferred(u64),
	/// The remote marker had advanced; the replica now holds the remote
	/// value and resolution is required.
	Conflicted(Conflict),
	/// No pending write to flush.
	Nothing,
}

/// Rebuilt view of one question, assembled on every context switch.
#[derive(Debug, Clone)]
pub struct QuestionContext {
	pub name: String,
	pub files: Vec<String>,
	pub open_files: Vec<String>,
	pub run_file: Option<String>,
	pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct ProjectContext {
	pub project: Project,
	pub questions: Vec<String>,
}

#[derive(Default)]
struct PendingWrite {
	contents: String,
	timer: Debounce,
}

#[derive(Default)]
struct EngineInner {
	pending: HashMap<FileId, PendingWrite>,
	states: HashMap<FileId, FileSyncState>,
	conflicts: HashMap<FileId, Conflict>,
	active_file: Option<FileId>,
}

impl EngineInner {
	fn state_of(&self, file: &FileId) -> FileSyncState {
		self.states.get(file).copied().unwrap_or_default()
	}

	fn set_state(&mut self, file: &FileId, command: SyncCommand) {
		let next = self.state_of(file).apply(command);
		self.states.insert(file.clone(), next);
	}

	fn forget_file(&mut self, file: &FileId) {
		self.pending.remove(file);
		self.states.remove(file);
		self.conflicts.remove(file);
		if self.active_file.as_ref() == Some(file) {
			self.active_file = None;
		}
	}
}

#[derive(Deserialize)]
struct WriteAck {
	version: u64,
}

#[derive(Deserialize)]
struct RemoteState {
	version: u64,
	contents: String,
}

enum WriteResult {
	Acked(u64),
	Conflicted(RemoteState),
}

/// Reconciles the local replica against the remote authority.
///
/// Edits are staged into a single-slot pending write per file and flushed
/// on a debounce, on demand, or forcibly before any context switch. Every
/// synced write carries the last remote-acknowledged version marker; a
/// marker mismatch becomes a recorded [`Conflict`] instead of a lost
/// update.
#[derive(Clone)]
pub struct SyncEngine {
	store: Arc<LocalStore>,
	socket: SocketClient,
	inner: Arc<Mutex<EngineInner>>,
	debounce_interval: Duration,
}

impl SyncEngine {
	pub fn new(store: Arc<LocalStore>, socket: SocketClient) -> Self {
		Self {
			store,
			socket,
			inner: Arc::new(Mutex::new(EngineInner::default())),
			debounce_interval: WRITE_DEBOUNCE,
		}
	}

	pub fn with_debounce(mut self, interval: Duration) -> Self {
		self.debounce_interval = interval;
		self
	}

	pub fn store(&self) -> &Arc<LocalStore> {
		&self.store
	}

	// ── Edits and flushing ──────────────────────────────────────────

	/// Buffer an edit. A later edit to the same file supersedes an
	/// unflushed earlier one; the debounced flush commits whatever is in
	/// the slot when it fires.
	pub async fn stage_write(&self, file_id: &FileId, contents: &str) {
		let mut inner = self.inner.lock().await;

		if inner.state_of(file_id) == FileSyncState::Conflict {
			// The conflict dialog owns this file until it is resolved.
			warn!(file = %file_id, "edit ignored while conflicted");
			return;
		}

		inner.active_file = Some(file_id.clone());

		let engine = self.clone();
		let id = file_id.clone();
		let interval = self.debounce_interval;

		let slot = inner.pending.entry(file_id.clone()).or_default();
		slot.contents = contents.to_string();
		slot.timer.arm(interval, async move {
			if let Err(e) = engine.flush(&id).await {
				warn!(file = %id, error = %e, "debounced flush failed");
			}
		});

		inner.set_state(file_id, SyncCommand::Edit);
	}

	/// Consume the pending write: commit it to the local replica, then
	/// sync it to the remote authority if the connection is up.
	///
	/// The local commit happens first so navigating away can never lose
	/// the edit, whatever the network does afterwards.
	pub async fn flush(&self, file_id: &FileId) -> Result<FlushOutcome, SyncError> {
		let contents = {
			let mut inner = self.inner.lock().await;
			let Some(mut pending) = inner.pending.remove(file_id) else {
				return Ok(FlushOutcome::Nothing);
			};
			pending.timer.cancel();
			inner.set_state(file_id, SyncCommand::FlushStarted);
			pending.contents
		};

		let mut entry = self.store.file(file_id).await?;
		entry.contents = contents;
		entry.touch();
		self.store.save_file(&entry).await?;

		if !self.socket.is_connected().await {
			debug!(file = %file_id, "offline, remote sync deferred");
			let mut inner = self.inner.lock().await;
			inner.set_state(file_id, SyncCommand::FlushFailed);
			return Ok(FlushOutcome::Deferred(entry.version));
		}

		self.push_entry(entry).await
	}

	/// Send one locally-committed entry to the remote authority and apply
	/// the outcome: acknowledged marker, recorded conflict, or deferral.
	async fn push_entry(&self, mut entry: FileEntry) -> Result<FlushOutcome, SyncError> {
		let file_id = entry.id.clone();
		let attempted = entry.contents.clone();
		let base_version = entry.synced_version;

		match self.send_write(&entry, &attempted, base_version).await {
			Ok(WriteResult::Acked(version)) => {
				entry.mark_synced(version);
				self.store.save_file(&entry).await?;

				let mut inner = self.inner.lock().await;
				inner.set_state(&file_id, SyncCommand::FlushSucceeded);

				info!(file = %file_id, version, "write synced");
				Ok(FlushOutcome::Flushed(version))
			}
			Ok(WriteResult::Conflicted(remote)) => {
				let conflict = self
					.apply_conflict(entry, attempted, base_version, remote)
					.await?;
				Ok(FlushOutcome::Conflicted(conflict))
			}
			Err(SyncError::Socket(SocketError::Transport(reason))) => {
				debug!(file = %file_id, reason = %reason, "remote sync deferred");
				let mut inner = self.inner.lock().await;
				inner.set_state(&file_id, SyncCommand::FlushFailed);
				Ok(FlushOutcome::Deferred(entry.version))
			}
			Err(SyncError::Socket(SocketError::Timeout)) => {
				debug!(file = %file_id, "remote sync timed out, deferred");
				let mut inner = self.inner.lock().await;
				inner.set_state(&file_id, SyncCommand::FlushFailed);
				Ok(FlushOutcome::Deferred(entry.version))
			}
			Err(e) => {
				let mut inner = self.inner.lock().await;
				inner.set_state(&file_id, SyncCommand::FlushFailed);
				Err(e)
			}
		}
	}

	async fn send_write(
		&self,
		entry: &FileEntry,
		contents: &str,
		base_version: u64,
	) -> Result<WriteResult, SyncError> {
		let result = self
			.socket
			.call(
				OP_FILE_WRITE,
				json!({
					"file": entry.id,
					"project": entry.project_id,
					"path": entry.path,
					"contents": contents,
					"base_version": base_version,
				}),
			)
			.await;

		match result {
			Ok(value) => {
				let ack: WriteAck = serde_json::from_value(value)
					.map_err(|e| SyncError::Protocol(e.to_string()))?;
				Ok(WriteResult::Acked(ack.version))
			}
			Err(SocketError::Remote { code, data, .. }) if code == ERR_VERSION_CONFLICT => {
				let data = data
					.ok_or_else(|| SyncError::Protocol("conflict without remote state".into()))?;
				let remote: RemoteState = serde_json::from_value(data)
					.map_err(|e| SyncError::Protocol(e.to_string()))?;
				Ok(WriteResult::Conflicted(remote))
			}
			Err(e) => Err(e.into()),
		}
	}

	/// Record a conflict and move the replica to the remote value. The
	/// rejected local candidate survives only inside the conflict record,
	/// where resolution can still choose it.
	async fn apply_conflict(
		&self,
		mut entry: FileEntry,
		attempted: String,
		base_version: u64,
		remote: RemoteState,
	) -> Result<Conflict, SyncError> {
		entry.contents = remote.contents.clone();
		entry.mark_synced(remote.version);
		self.store.save_file(&entry).await?;

		let conflict = Conflict {
			file_id: entry.id.clone(),
			path: entry.path.clone(),
			local_version: base_version,
			remote_version: remote.version,
			local_contents: attempted,
			remote_contents: remote.contents,
		};

		let mut inner = self.inner.lock().await;
		inner.conflicts.insert(entry.id.clone(), conflict.clone());
		inner.set_state(&entry.id, SyncCommand::RemoteRejected);

		warn!(
			file = %entry.id,
			path = %entry.path,
			local_version = conflict.local_version,
			remote_version = conflict.remote_version,
			"write conflict"
		);

		Ok(conflict)
	}

	/// Flush the pending write of the previously active file, if any.
	/// Context switches call this and wait for it to settle (success,
	/// deferral, or conflict) before loading anything new.
	pub async fn flush_active(&self) -> Result<FlushOutcome, SyncError> {
		let active = { self.inner.lock().await.active_file.clone() };
		match active {
			Some(file_id) => self.flush(&file_id).await,
			None => Ok(FlushOutcome::Nothing),
		}
	}

	pub async fn flush_all(&self) -> Result<(), SyncError> {
		let ids: Vec<FileId> = {
			let inner = self.inner.lock().await;
			inner.pending.keys().cloned().collect()
		};
		for file_id in ids {
			self.flush(&file_id).await?;
		}
		Ok(())
	}

	/// Settle everything for `project`: flush pending writes, push every
	/// locally-committed-but-unsynced file, then fail if any conflict is
	/// outstanding. Callers about to compile need a reconciled replica.
	pub async fn wait_for_sync(&self, project: &ProjectId) -> Result<(), SyncError> {
		self.flush_all().await?;

		for entry in self.store.list_files(project).await? {
			if !entry.dirty() {
				continue;
			}
			let conflicted = {
				let inner = self.inner.lock().await;
				inner.conflicts.contains_key(&entry.id)
			};
			if conflicted {
				continue;
			}
			self.push_entry(entry).await?;
		}

		let first_conflict = {
			let inner = self.inner.lock().await;
			inner.conflicts.values().next().cloned()
		};
		match first_conflict {
			Some(conflict) => Err(SyncError::Conflict(Box::new(conflict))),
			None => Ok(()),
		}
	}

	// ── Conflict resolution ─────────────────────────────────────────

	pub async fn state(&self, file_id: &FileId) -> FileSyncState {
		self.inner.lock().await.state_of(file_id)
	}

	pub async fn conflict(&self, file_id: &FileId) -> Option<Conflict> {
		self.inner.lock().await.conflicts.get(file_id).cloned()
	}

	/// Resolve a recorded conflict with exactly one user choice. Keeping
	/// the local candidate re-submits it against the remote marker that
	/// rejected it; keeping the remote value is purely local (the replica
	/// already holds it). Returns the committed version marker.
	pub async fn resolve_conflict(
		&self,
		file_id: &FileId,
		resolution: Resolution,
	) -> Result<u64, SyncError> {
		let conflict = {
			let mut inner = self.inner.lock().await;
			inner
				.conflicts
				.remove(file_id)
				.ok_or_else(|| SyncError::NoConflict(file_id.to_string()))?
		};

		match resolution {
			Resolution::KeepRemote => {
				let mut inner = self.inner.lock().await;
				inner.set_state(file_id, SyncCommand::Resolved);
				info!(file = %file_id, version = conflict.remote_version, "conflict resolved: kept remote");
				Ok(conflict.remote_version)
			}
			Resolution::KeepLocal => {
				let mut entry = self.store.file(file_id).await?;
				let result = self
					.send_write(&entry, &conflict.local_contents, conflict.remote_version)
					.await;

				match result {
					Ok(WriteResult::Acked(version)) => {
						entry.contents = conflict.local_contents.clone();
						entry.mark_synced(version);
						self.store.save_file(&entry).await?;

						let mut inner = self.inner.lock().await;
						inner.set_state(file_id, SyncCommand::Resolved);

						info!(file = %file_id, version, "conflict resolved: kept local");
						Ok(version)
					}
					Ok(WriteResult::Conflicted(remote)) => {
						// The remote moved again underneath the dialog.
						let conflict = self
							.apply_conflict(entry, conflict.local_contents, conflict.remote_version, remote)
							.await?;
						Err(SyncError::Conflict(Box::new(conflict)))
					}
					Err(e) => {
						let mut inner = self.inner.lock().await;
						inner.conflicts.insert(file_id.clone(), conflict);
						Err(e)
					}
				}
			}
		}
	}

	// ── Projects ────────────────────────────────────────────────────

	/// Create a project: announced remotely first, then committed to the
	/// replica with the same id.
	pub async fn create_project(&self, name: &str) -> Result<Project, SyncError> {
		let project = Project::new(name);
		self.socket
			.call(
				OP_PROJECT_CREATE,
				json!({"project": project.id, "name": name}),
			)
			.await?;
		self.store.save_project(&project).await?;
		Ok(project)
	}

	pub async fn rename_project(&self, id: &ProjectId, name: &str) -> Result<Project, SyncError> {
		self.socket
			.call(OP_PROJECT_RENAME, json!({"project": id, "name": name}))
			.await?;
		Ok(self.store.rename_project(id, name).await?)
	}

	/// Delete a project remotely, then locally. A remote failure leaves
	/// the replica untouched.
	pub async fn delete_project(&self, id: &ProjectId) -> Result<(), SyncError> {
		let files = self.store.list_files(id).await?;

		self.socket
			.call(OP_PROJECT_DELETE, json!({"project": id}))
			.await?;
		self.store.delete_project(id).await?;

		let mut inner = self.inner.lock().await;
		for file in &files {
			inner.forget_file(&file.id);
		}

		Ok(())
	}

	// ── Files ───────────────────────────────────────────────────────

	pub async fn create_file(
		&self,
		project: &ProjectId,
		path: &str,
		contents: &str,
	) -> Result<FileEntry, SyncError> {
		match self.store.file_by_path(project, path).await {
			Ok(_) => return Err(StoreError::PathExists(path.to_string()).into()),
			Err(StoreError::NotFound(_)) => {}
			Err(e) => return Err(e.into()),
		}

		let mut entry = FileEntry::new(project.clone(), path, contents);
		let value = self
			.socket
			.call(
				OP_FILE_CREATE,
				json!({
					"file": entry.id,
					"project": project,
					"path": path,
					"contents": contents,
				}),
			)
			.await?;

		let ack: WriteAck =
			serde_json::from_value(value).map_err(|e| SyncError::Protocol(e.to_string()))?;
		entry.mark_synced(ack.version);

		self.store.insert_file(&entry).await?;
		Ok(entry)
	}

	/// Delete a file remotely, then locally; open-file membership cascades
	/// with the local delete.
	pub async fn delete_file(&self, file_id: &FileId) -> Result<(), SyncError> {
		self.store.file(file_id).await?;

		self.socket
			.call(OP_FILE_DELETE, json!({"file": file_id}))
			.await?;
		self.store.delete_file(file_id).await?;

		let mut inner = self.inner.lock().await;
		inner.forget_file(file_id);

		Ok(())
	}

	/// Rename a file remotely, then locally. The target path is checked
	/// against the replica first so an obviously-doomed rename never
	/// reaches the wire.
	pub async fn rename_file(&self, file_id: &FileId, to: &str) -> Result<FileEntry, SyncError> {
		let entry = self.store.file(file_id).await?;
		match self.store.file_by_path(&entry.project_id, to).await {
			Ok(_) => return Err(StoreError::PathExists(to.to_string()).into()),
			Err(StoreError::NotFound(_)) => {}
			Err(e) => return Err(e.into()),
		}

		self.socket
			.call(OP_FILE_RENAME, json!({"file": file_id, "to": to}))
			.await?;
		Ok(self.store.rename_file(file_id, to).await?)
	}

	// ── Context switching ───────────────────────────────────────────

	/// Make `path` the active file, flushing the previous one first so no
	/// edit is lost across the switch.
	pub async fn switch_file(
		&self,
		project: &ProjectId,
		path: &str,
	) -> Result<FileEntry, SyncError> {
		self.flush_active().await?;

		let entry = self.store.file_by_path(project, path).await?;
		{
			let mut inner = self.inner.lock().await;
			inner.active_file = Some(entry.id.clone());
		}
		Ok(entry)
	}

	/// Rebuild the context for one question after settling the previous
	/// file's pending write.
	pub async fn switch_question(
		&self,
		project: &ProjectId,
		name: &str,
	) -> Result<QuestionContext, SyncError> {
		self.flush_active().await?;

		let mut files: Vec<String> = self
			.store
			.list_files(project)
			.await?
			.into_iter()
			.filter(|f| f.question() == name)
			.map(|f| f.path)
			.collect();
		files.sort();

		let open_files = self.store.open_files(project, name).await?;
		let run_file = self.store.run_file(project, name).await?;

		Ok(QuestionContext {
			name: name.to_string(),
			files,
			open_files,
			run_file,
			diagnostics: Vec::new(),
		})
	}

	/// Load a project after settling the previous context, bumping its
	/// last-used stamp.
	pub async fn switch_project(&self, id: &ProjectId) -> Result<ProjectContext, SyncError> {
		self.flush_active().await?;

		{
			let mut inner = self.inner.lock().await;
			inner.active_file = None;
		}

		self.store.touch_project(id).await?;
		let project = self.store.project(id).await?;
		let questions = self.store.list_questions(id).await?;

		Ok(ProjectContext { project, questions })
	}

	pub async fn open_file(
		&self,
		project: &ProjectId,
		question: &str,
		path: &str,
	) -> Result<(), SyncError> {
		Ok(self.store.add_open_file(project, question, path).await?)
	}

	pub async fn close_file(
		&self,
		project: &ProjectId,
		question: &str,
		path: &str,
	) -> Result<(), SyncError> {
		Ok(self.store.remove_open_file(project, question, path).await?)
	}

	pub async fn set_run_file(
		&self,
		project: &ProjectId,
		question: &str,
		path: &str,
	) -> Result<(), SyncError> {
		Ok(self.store.set_run_file(project, question, path).await?)
	}
}
