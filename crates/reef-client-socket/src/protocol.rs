// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Wire protocol: line-framed JSON envelopes exchanged with the remote
//! authority, plus the typed payloads carried by server pushes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client→server request.
#[derive(Debug, Serialize)]
pub struct Request<'a> {
	pub id: u64,
	pub operation: &'a str,
	pub arguments: Value,
}

/// Error details attached to a rejected request. `data` carries
/// operation-specific context: a `version_conflict` rejection includes the
/// authority's current `{version, contents}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFailure {
	pub code: String,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

/// Server→client push (no correlation id), scoped to a run session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Push {
	pub session: String,
	#[serde(rename = "type")]
	pub kind: PushKind,
	pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PushKind {
	Stdout,
	Stderr,
	Done,
	TestResult,
	Diagnostics,
}

// Operation names
pub const OP_AUTH: &str = "auth";
pub const OP_PROJECT_CREATE: &str = "project_create";
pub const OP_PROJECT_RENAME: &str = "project_rename";
pub const OP_PROJECT_DELETE: &str = "project_delete";
pub const OP_FILE_CREATE: &str = "file_create";
pub const OP_FILE_WRITE: &str = "file_write";
pub const OP_FILE_RENAME: &str = "file_rename";
pub const OP_FILE_DELETE: &str = "file_delete";
pub const OP_SESSION_SUBSCRIBE: &str = "session_subscribe";
pub const OP_SESSION_UNSUBSCRIBE: &str = "session_unsubscribe";
pub const OP_COMPILE_RUN: &str = "compile_run";
pub const OP_PROGRAM_KILL: &str = "program_kill";
pub const OP_GRADING_RESULTS: &str = "grading_results";

// Error codes
pub const ERR_NOT_FOUND: &str = "not_found";
pub const ERR_PATH_EXISTS: &str = "path_exists";
pub const ERR_VERSION_CONFLICT: &str = "version_conflict";
pub const ERR_AUTH_FAILED: &str = "auth_failed";
pub const ERR_INVALID_PARAMS: &str = "invalid_params";
pub const ERR_INTERNAL: &str = "internal_error";

// ── Push payloads ───────────────────────────────────────────────────

/// Payload of a `stdout`/`stderr` push: one arbitrarily-sized fragment of
/// the process's output, not aligned to line boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputChunk {
	pub message: String,
}

/// Payload of a `done` push. `asan` carries the raw JSON of a structured
/// memory-diagnostic report when the run tripped the sanitizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDone {
	pub status: i32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub asan: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestVerdict {
	Passed,
	Failed,
	Error,
	NoExpect,
	Timeout,
	Killed,
}

/// Payload of a `test-result` push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
	pub test_name: String,
	pub result: TestVerdict,
	#[serde(default)]
	pub stdout: String,
	#[serde(default)]
	pub stderr: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expected: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub asan_output: Option<String>,
}

/// One compiler message, as reported by the remote toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
	pub file: String,
	pub line: u32,
	pub column: u32,
	pub message: String,
	pub error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompileStatus {
	Running,
	CompileFailed,
}

/// Result of a `compile_run` request. `session` scopes the pushed output
/// stream and is present only when execution started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileOutcome {
	pub status: CompileStatus,
	#[serde(default)]
	pub messages: Vec<Diagnostic>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session: Option<String>,
}

pub const GRADING_COMPLETE: &str = "complete";

/// Result of a `grading_results` request against the external grader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingReport {
	pub status: String,
	#[serde(default)]
	pub detail: Value,
}

impl GradingReport {
	pub fn is_complete(&self) -> bool {
		self.status == GRADING_COMPLETE
	}
}
