// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::IdError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
	pub fn new() -> Self {
		let uuid = uuid7::uuid7();
		Self(format!("P-{uuid}"))
	}

	/// Create a ProjectId from an existing string without validation.
	/// Use `parse()` if you need validation.
	pub fn from_string(s: String) -> Self {
		Self(s)
	}

	pub fn parse(s: &str) -> Result<Self, IdError> {
		parse_prefixed("P-", s)?;
		Ok(Self(s.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Default for ProjectId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for ProjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for ProjectId {
	type Err = IdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
	pub fn new() -> Self {
		let uuid = uuid7::uuid7();
		Self(format!("F-{uuid}"))
	}

	/// Create a FileId from an existing string without validation.
	/// Use `parse()` if you need validation.
	pub fn from_string(s: String) -> Self {
		Self(s)
	}

	pub fn parse(s: &str) -> Result<Self, IdError> {
		parse_prefixed("F-", s)?;
		Ok(Self(s.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Default for FileId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for FileId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for FileId {
	type Err = IdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

fn parse_prefixed(prefix: &'static str, s: &str) -> Result<(), IdError> {
	let Some(uuid_part) = s.strip_prefix(prefix) else {
		return Err(IdError::InvalidPrefix {
			expected: prefix,
			got: s.chars().take(2).collect(),
		});
	};
	uuid::Uuid::parse_str(uuid_part)?;
	Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
	pub id: ProjectId,
	pub name: String,
	pub last_used: String,
}

impl Project {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			id: ProjectId::new(),
			name: name.into(),
			last_used: Utc::now().to_rfc3339(),
		}
	}

	pub fn touch(&mut self) {
		self.last_used = Utc::now().to_rfc3339();
	}
}

/// One stored file. `path` is unique within the owning project and its
/// leading segment names the question the file belongs to
/// (`q1/main.c` → question `q1`).
///
/// `version` is the current committed marker and advances on every
/// committed write, local or remote. `synced_version` is the marker the
/// remote authority last acknowledged, carried as the base of the next
/// synced write so concurrent modification is detected. The two diverge
/// exactly while a local commit awaits sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
	pub id: FileId,
	pub project_id: ProjectId,
	pub path: String,
	pub contents: String,
	pub version: u64,
	pub synced_version: u64,
}

impl FileEntry {
	pub fn new(project_id: ProjectId, path: impl Into<String>, contents: impl Into<String>) -> Self {
		Self {
			id: FileId::new(),
			project_id,
			path: path.into(),
			contents: contents.into(),
			version: 1,
			synced_version: 1,
		}
	}

	/// Question this file belongs to: the leading path segment.
	pub fn question(&self) -> &str {
		match self.path.split_once('/') {
			Some((question, _)) => question,
			None => &self.path,
		}
	}

	pub fn touch(&mut self) {
		self.version += 1;
	}

	/// Mark a remote-acknowledged commit: both markers take the
	/// authority's value.
	pub fn mark_synced(&mut self, remote_version: u64) {
		self.version = remote_version;
		self.synced_version = remote_version;
	}

	/// True while a local commit has not been acknowledged remotely.
	pub fn dirty(&self) -> bool {
		self.version != self.synced_version
	}
}

/// Persisted per-(project, question) state: which files are open in the
/// editor and which one runs. Everything else about a question is derived
/// from file paths when the context is rebuilt.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuestionState {
	pub name: String,
	#[serde(default)]
	pub open_files: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub run_file: Option<String>,
}

impl QuestionState {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			open_files: Vec::new(),
			run_file: None,
		}
	}
}

/// Default contents for a newly created file, by extension.
pub fn default_contents(path: &str) -> &'static str {
	match path.rsplit_once('.').map(|(_, ext)| ext) {
		Some("c") => "\nint main() {\n\treturn 0;\n}\n",
		Some("h") => "\n// Write your interface here.\n",
		Some("rkt") => "#lang racket\n\n",
		_ => "",
	}
}
