// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::model::{FileEntry, FileId, Project, ProjectId, QuestionState};

/// JSON-file-per-record store rooted at a directory:
///
/// ```text
/// <root>/projects/<project-id>.json
/// <root>/files/<file-id>.json
/// <root>/questions/<project-id>/<question>.json
/// ```
///
/// Every write goes through a temp file and rename, so a crash mid-write
/// never leaves a torn record behind.
pub struct LocalStore {
	root: PathBuf,
}

impl LocalStore {
	pub fn new(root: PathBuf) -> Self {
		Self { root }
	}

	pub fn from_xdg() -> Result<Self, StoreError> {
		let data_dir = dirs::data_dir().ok_or_else(|| {
			StoreError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				"could not determine XDG data directory",
			))
		})?;

		let root = data_dir.join("reef");
		std::fs::create_dir_all(&root)?;

		info!(root = %root.display(), "initialized local store");

		Ok(Self::new(root))
	}

	fn project_path(&self, id: &ProjectId) -> PathBuf {
		self.root.join("projects").join(format!("{id}.json"))
	}

	fn file_path(&self, id: &FileId) -> PathBuf {
		self.root.join("files").join(format!("{id}.json"))
	}

	fn question_path(&self, project: &ProjectId, question: &str) -> PathBuf {
		self.root
			.join("questions")
			.join(project.as_str())
			.join(format!("{question}.json"))
	}

	// ── Projects ────────────────────────────────────────────────────

	pub async fn create_project(&self, name: &str) -> Result<Project, StoreError> {
		let project = Project::new(name);
		write_json(&self.project_path(&project.id), &project).await?;

		info!(project_id = %project.id, name = name, "created project");

		Ok(project)
	}

	/// Persist a project record as-is. The sync layer uses this to commit
	/// creations whose id was already announced to the remote authority.
	pub async fn save_project(&self, project: &Project) -> Result<(), StoreError> {
		write_json(&self.project_path(&project.id), project).await
	}

	pub async fn project(&self, id: &ProjectId) -> Result<Project, StoreError> {
		read_json(&self.project_path(id))
			.await?
			.ok_or_else(|| StoreError::NotFound(id.to_string()))
	}

	/// All projects, most recently used first.
	pub async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
		let mut projects: Vec<Project> = scan_dir(&self.root.join("projects")).await?;
		projects.sort_by(|a, b| b.last_used.cmp(&a.last_used));

		debug!(count = projects.len(), "listed projects");

		Ok(projects)
	}

	pub async fn rename_project(&self, id: &ProjectId, name: &str) -> Result<Project, StoreError> {
		let mut project = self.project(id).await?;
		project.name = name.to_string();
		project.touch();
		write_json(&self.project_path(id), &project).await?;
		Ok(project)
	}

	pub async fn touch_project(&self, id: &ProjectId) -> Result<(), StoreError> {
		let mut project = self.project(id).await?;
		project.touch();
		write_json(&self.project_path(id), &project).await
	}

	/// Delete a project and everything under it: files and question state.
	pub async fn delete_project(&self, id: &ProjectId) -> Result<(), StoreError> {
		let path = self.project_path(id);
		if !path.exists() {
			return Err(StoreError::NotFound(id.to_string()));
		}

		for file in self.list_files(id).await? {
			tokio::fs::remove_file(self.file_path(&file.id)).await?;
		}

		let questions_dir = self.root.join("questions").join(id.as_str());
		if questions_dir.exists() {
			tokio::fs::remove_dir_all(&questions_dir).await?;
		}

		tokio::fs::remove_file(&path).await?;

		info!(project_id = %id, "deleted project");

		Ok(())
	}

	// ── Files ───────────────────────────────────────────────────────

	pub async fn create_file(
		&self,
		project: &ProjectId,
		path: &str,
		contents: &str,
	) -> Result<FileEntry, StoreError> {
		let entry = FileEntry::new(project.clone(), path, contents);
		self.insert_file(&entry).await?;
		Ok(entry)
	}

	/// Insert a record the caller built (the sync layer announces ids
	/// remotely before committing locally). Enforces the per-project path
	/// constraint.
	pub async fn insert_file(&self, entry: &FileEntry) -> Result<(), StoreError> {
		self.project(&entry.project_id).await?;

		if self
			.find_by_path(&entry.project_id, &entry.path)
			.await?
			.is_some()
		{
			return Err(StoreError::PathExists(entry.path.clone()));
		}

		write_json(&self.file_path(&entry.id), entry).await?;

		info!(
			file_id = %entry.id,
			project_id = %entry.project_id,
			path = %entry.path,
			"created file"
		);

		Ok(())
	}

	pub async fn file(&self, id: &FileId) -> Result<FileEntry, StoreError> {
		read_json(&self.file_path(id))
			.await?
			.ok_or_else(|| StoreError::NotFound(id.to_string()))
	}

	pub async fn file_by_path(
		&self,
		project: &ProjectId,
		path: &str,
	) -> Result<FileEntry, StoreError> {
		self.find_by_path(project, path)
			.await?
			.ok_or_else(|| StoreError::NotFound(format!("{project}:{path}")))
	}

	async fn find_by_path(
		&self,
		project: &ProjectId,
		path: &str,
	) -> Result<Option<FileEntry>, StoreError> {
		let files: Vec<FileEntry> = scan_dir(&self.root.join("files")).await?;
		Ok(files
			.into_iter()
			.find(|f| &f.project_id == project && f.path == path))
	}

	/// All files belonging to `project`, in unspecified order.
	pub async fn list_files(&self, project: &ProjectId) -> Result<Vec<FileEntry>, StoreError> {
		let files: Vec<FileEntry> = scan_dir(&self.root.join("files")).await?;
		Ok(files
			.into_iter()
			.filter(|f| &f.project_id == project)
			.collect())
	}

	/// Overwrite a file record as-is. The caller owns the version marker;
	/// the sync layer uses this to commit remote-assigned markers.
	pub async fn save_file(&self, entry: &FileEntry) -> Result<(), StoreError> {
		write_json(&self.file_path(&entry.id), entry).await?;

		debug!(file_id = %entry.id, version = entry.version, "saved file");

		Ok(())
	}

	/// Commit new contents locally and return the post-write marker.
	pub async fn write_file(&self, id: &FileId, contents: &str) -> Result<u64, StoreError> {
		let mut entry = self.file(id).await?;
		entry.contents = contents.to_string();
		entry.touch();
		self.save_file(&entry).await?;
		Ok(entry.version)
	}

	pub async fn delete_file(&self, id: &FileId) -> Result<(), StoreError> {
		let entry = self.file(id).await?;
		tokio::fs::remove_file(self.file_path(id)).await?;

		// Cascade: the path is no longer openable.
		self.remove_open_file(&entry.project_id, entry.question(), &entry.path)
			.await?;

		info!(file_id = %id, path = %entry.path, "deleted file");

		Ok(())
	}

	pub async fn rename_file(&self, id: &FileId, to: &str) -> Result<FileEntry, StoreError> {
		let mut entry = self.file(id).await?;

		if self.find_by_path(&entry.project_id, to).await?.is_some() {
			return Err(StoreError::PathExists(to.to_string()));
		}

		let old_path = entry.path.clone();
		let old_question = entry.question().to_string();
		entry.path = to.to_string();
		entry.touch();
		self.save_file(&entry).await?;

		self.remove_open_file(&entry.project_id, &old_question, &old_path)
			.await?;

		info!(file_id = %id, from = %old_path, to = to, "renamed file");

		Ok(entry)
	}

	// ── Questions ───────────────────────────────────────────────────

	/// Question names, derived from the leading segment of file paths.
	pub async fn list_questions(&self, project: &ProjectId) -> Result<Vec<String>, StoreError> {
		let mut questions: Vec<String> = self
			.list_files(project)
			.await?
			.iter()
			.map(|f| f.question().to_string())
			.collect();
		questions.sort();
		questions.dedup();
		Ok(questions)
	}

	pub async fn question_state(
		&self,
		project: &ProjectId,
		question: &str,
	) -> Result<QuestionState, StoreError> {
		Ok(read_json(&self.question_path(project, question))
			.await?
			.unwrap_or_else(|| QuestionState::new(question)))
	}

	async fn save_question_state(
		&self,
		project: &ProjectId,
		state: &QuestionState,
	) -> Result<(), StoreError> {
		write_json(&self.question_path(project, &state.name), state).await
	}

	pub async fn add_open_file(
		&self,
		project: &ProjectId,
		question: &str,
		path: &str,
	) -> Result<(), StoreError> {
		let mut state = self.question_state(project, question).await?;
		if !state.open_files.iter().any(|p| p == path) {
			state.open_files.push(path.to_string());
			self.save_question_state(project, &state).await?;
		}
		Ok(())
	}

	pub async fn remove_open_file(
		&self,
		project: &ProjectId,
		question: &str,
		path: &str,
	) -> Result<(), StoreError> {
		let mut state = self.question_state(project, question).await?;
		let before = state.open_files.len();
		state.open_files.retain(|p| p != path);
		let mut changed = state.open_files.len() != before;
		if state.run_file.as_deref() == Some(path) {
			state.run_file = None;
			changed = true;
		}
		if changed {
			self.save_question_state(project, &state).await?;
		}
		Ok(())
	}

	pub async fn open_files(
		&self,
		project: &ProjectId,
		question: &str,
	) -> Result<Vec<String>, StoreError> {
		Ok(self.question_state(project, question).await?.open_files)
	}

	pub async fn set_run_file(
		&self,
		project: &ProjectId,
		question: &str,
		path: &str,
	) -> Result<(), StoreError> {
		let mut state = self.question_state(project, question).await?;
		state.run_file = Some(path.to_string());
		self.save_question_state(project, &state).await
	}

	pub async fn run_file(
		&self,
		project: &ProjectId,
		question: &str,
	) -> Result<Option<String>, StoreError> {
		Ok(self.question_state(project, question).await?.run_file)
	}
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
	if !path.exists() {
		return Ok(None);
	}
	let contents = tokio::fs::read_to_string(path).await?;
	Ok(Some(serde_json::from_str(&contents)?))
}

/// Write a record atomically: temp file in the same directory, then rename.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
	if let Some(parent) = path.parent() {
		tokio::fs::create_dir_all(parent).await?;
	}

	let tmp_path = path.with_extension("json.tmp");
	let json = serde_json::to_string_pretty(value)?;

	tokio::fs::write(&tmp_path, &json).await?;
	tokio::fs::rename(&tmp_path, path).await?;

	Ok(())
}

async fn scan_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StoreError> {
	if !dir.exists() {
		return Ok(Vec::new());
	}

	let mut entries = tokio::fs::read_dir(dir).await?;
	let mut records = Vec::new();

	while let Some(entry) = entries.next_entry().await? {
		let path = entry.path();
		if path.extension().and_then(|e| e.to_str()) != Some("json") {
			continue;
		}

		match tokio::fs::read_to_string(&path).await {
			Ok(contents) => match serde_json::from_str(&contents) {
				Ok(record) => records.push(record),
				Err(e) => {
					error!(path = %path.display(), error = %e, "failed to parse record");
				}
			},
			Err(e) => {
				error!(path = %path.display(), error = %e, "failed to read record");
			}
		}
	}

	Ok(records)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	async fn create_test_store() -> (LocalStore, TempDir) {
		let tmp = TempDir::new().unwrap();
		let store = LocalStore::new(tmp.path().to_path_buf());
		(store, tmp)
	}

	#[tokio::test]
	async fn test_write_then_read_roundtrips_and_keeps_marker() {
		let (store, _tmp) = create_test_store().await;
		let project = store.create_project("A1").await.unwrap();

		let entry = store
			.create_file(&project.id, "q1/main.c", "int main() {}")
			.await
			.unwrap();

		let read = store.file(&entry.id).await.unwrap();
		assert_eq!(read.contents, "int main() {}");
		assert_eq!(read.version, entry.version, "read must not advance the marker");

		let again = store.file_by_path(&project.id, "q1/main.c").await.unwrap();
		assert_eq!(again.id, entry.id);
	}

	#[tokio::test]
	async fn test_write_file_bumps_marker() {
		let (store, _tmp) = create_test_store().await;
		let project = store.create_project("A1").await.unwrap();
		let entry = store.create_file(&project.id, "q1/main.c", "").await.unwrap();

		let v2 = store.write_file(&entry.id, "x").await.unwrap();
		let v3 = store.write_file(&entry.id, "y").await.unwrap();

		assert!(v2 > entry.version);
		assert!(v3 > v2);

		let read = store.file(&entry.id).await.unwrap();
		assert_eq!(read.contents, "y");
		assert!(read.dirty(), "local commits await remote acknowledgement");
	}

	#[tokio::test]
	async fn test_duplicate_path_rejected() {
		let (store, _tmp) = create_test_store().await;
		let project = store.create_project("A1").await.unwrap();
		store.create_file(&project.id, "q1/main.c", "").await.unwrap();

		let result = store.create_file(&project.id, "q1/main.c", "other").await;
		assert!(matches!(result, Err(StoreError::PathExists(_))));

		// Same path in a different project is fine.
		let other = store.create_project("A2").await.unwrap();
		store.create_file(&other.id, "q1/main.c", "").await.unwrap();
	}

	#[tokio::test]
	async fn test_missing_keys_are_not_found() {
		let (store, _tmp) = create_test_store().await;

		assert!(matches!(
			store.project(&ProjectId::new()).await,
			Err(StoreError::NotFound(_))
		));
		assert!(matches!(
			store.file(&FileId::new()).await,
			Err(StoreError::NotFound(_))
		));
		assert!(matches!(
			store.delete_project(&ProjectId::new()).await,
			Err(StoreError::NotFound(_))
		));

		let project = store.create_project("A1").await.unwrap();
		assert!(matches!(
			store.file_by_path(&project.id, "q1/nope.c").await,
			Err(StoreError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_rename_updates_path_and_open_set() {
		let (store, _tmp) = create_test_store().await;
		let project = store.create_project("A1").await.unwrap();
		let entry = store.create_file(&project.id, "q1/main.c", "").await.unwrap();
		store.add_open_file(&project.id, "q1", "q1/main.c").await.unwrap();

		let renamed = store.rename_file(&entry.id, "q1/solution.c").await.unwrap();
		assert_eq!(renamed.path, "q1/solution.c");
		assert!(renamed.version > entry.version);

		let open = store.open_files(&project.id, "q1").await.unwrap();
		assert!(open.is_empty(), "old path must leave the open set");
	}

	#[tokio::test]
	async fn test_rename_onto_existing_path_rejected() {
		let (store, _tmp) = create_test_store().await;
		let project = store.create_project("A1").await.unwrap();
		let a = store.create_file(&project.id, "q1/a.c", "").await.unwrap();
		store.create_file(&project.id, "q1/b.c", "").await.unwrap();

		let result = store.rename_file(&a.id, "q1/b.c").await;
		assert!(matches!(result, Err(StoreError::PathExists(_))));

		// Unchanged on failure.
		assert_eq!(store.file(&a.id).await.unwrap().path, "q1/a.c");
	}

	#[tokio::test]
	async fn test_delete_file_cascades_open_membership() {
		let (store, _tmp) = create_test_store().await;
		let project = store.create_project("A1").await.unwrap();
		let entry = store.create_file(&project.id, "q1/main.c", "").await.unwrap();
		store.add_open_file(&project.id, "q1", "q1/main.c").await.unwrap();
		store.set_run_file(&project.id, "q1", "q1/main.c").await.unwrap();

		store.delete_file(&entry.id).await.unwrap();

		assert!(store.open_files(&project.id, "q1").await.unwrap().is_empty());
		assert!(store.run_file(&project.id, "q1").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_delete_project_cascades() {
		let (store, _tmp) = create_test_store().await;
		let project = store.create_project("A1").await.unwrap();
		let entry = store.create_file(&project.id, "q1/main.c", "").await.unwrap();
		store.add_open_file(&project.id, "q1", "q1/main.c").await.unwrap();

		store.delete_project(&project.id).await.unwrap();

		assert!(matches!(
			store.project(&project.id).await,
			Err(StoreError::NotFound(_))
		));
		assert!(matches!(
			store.file(&entry.id).await,
			Err(StoreError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_questions_derived_from_paths() {
		let (store, _tmp) = create_test_store().await;
		let project = store.create_project("A1").await.unwrap();
		store.create_file(&project.id, "q2/main.c", "").await.unwrap();
		store.create_file(&project.id, "q1/main.c", "").await.unwrap();
		store.create_file(&project.id, "q1/tests.c", "").await.unwrap();

		let questions = store.list_questions(&project.id).await.unwrap();
		assert_eq!(questions, vec!["q1".to_string(), "q2".to_string()]);
	}

	#[tokio::test]
	async fn test_open_files_and_run_file() {
		let (store, _tmp) = create_test_store().await;
		let project = store.create_project("A1").await.unwrap();
		store.create_file(&project.id, "q1/main.c", "").await.unwrap();
		store.create_file(&project.id, "q1/lib.c", "").await.unwrap();

		store.add_open_file(&project.id, "q1", "q1/main.c").await.unwrap();
		store.add_open_file(&project.id, "q1", "q1/lib.c").await.unwrap();
		// Re-opening is a no-op, not a duplicate.
		store.add_open_file(&project.id, "q1", "q1/main.c").await.unwrap();

		let open = store.open_files(&project.id, "q1").await.unwrap();
		assert_eq!(open, vec!["q1/main.c".to_string(), "q1/lib.c".to_string()]);

		assert!(store.run_file(&project.id, "q1").await.unwrap().is_none());
		store.set_run_file(&project.id, "q1", "q1/main.c").await.unwrap();
		assert_eq!(
			store.run_file(&project.id, "q1").await.unwrap().as_deref(),
			Some("q1/main.c")
		);

		store.remove_open_file(&project.id, "q1", "q1/lib.c").await.unwrap();
		let open = store.open_files(&project.id, "q1").await.unwrap();
		assert_eq!(open, vec!["q1/main.c".to_string()]);
	}

	#[tokio::test]
	async fn test_list_projects_most_recent_first() {
		let (store, _tmp) = create_test_store().await;
		let a = store.create_project("A1").await.unwrap();
		let b = store.create_project("A2").await.unwrap();

		store.touch_project(&a.id).await.unwrap();

		let projects = store.list_projects().await.unwrap();
		assert_eq!(projects.len(), 2);
		assert_eq!(projects[0].id, a.id, "touched project sorts first");
		assert_eq!(projects[1].id, b.id);
	}
}
