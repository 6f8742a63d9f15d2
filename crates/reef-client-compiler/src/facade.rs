// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use reef_client_console::OutputAssembler;
use reef_client_socket::protocol::{
	CompileOutcome, CompileStatus, Diagnostic, Push, PushKind, OP_COMPILE_RUN, OP_PROGRAM_KILL,
};
use reef_client_socket::SocketClient;
use reef_client_store::{FileId, ProjectId};
use reef_client_sync::SyncEngine;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::CompilerError;
use crate::poll::{poll_grading, GradingPoll};
use crate::state::{RunCommand, RunState};

struct FacadeInner {
	state: RunState,
	session: Option<String>,
	diagnostics: Vec<Diagnostic>,
	pump: Option<JoinHandle<()>>,
}

/// Orchestrates compile/run/test requests and publishes run state.
///
/// One run at a time: `compile_and_run` settles storage sync first (so the
/// remote toolchain sees exactly what the editor shows), then feeds the
/// run session's pushed output into the console assembler until the
/// terminal `done` push arrives.
#[derive(Clone)]
pub struct CompilerFacade {
	sync: SyncEngine,
	socket: SocketClient,
	console: Arc<OutputAssembler>,
	inner: Arc<Mutex<FacadeInner>>,
}

impl CompilerFacade {
	pub fn new(sync: SyncEngine, socket: SocketClient, console: Arc<OutputAssembler>) -> Self {
		Self {
			sync,
			socket,
			console,
			inner: Arc::new(Mutex::new(FacadeInner {
				state: RunState::Idle,
				session: None,
				diagnostics: Vec::new(),
				pump: None,
			})),
		}
	}

	pub async fn run_state(&self) -> RunState {
		self.inner.lock().await.state
	}

	/// Diagnostics published by the most recent compile.
	pub async fn diagnostics(&self) -> Vec<Diagnostic> {
		self.inner.lock().await.diagnostics.clone()
	}

	/// Compile `file` and, if the build succeeds, stream the run (or test
	/// run) into the console.
	pub async fn compile_and_run(
		&self,
		project: &ProjectId,
		question: &str,
		file: &FileId,
		test: bool,
	) -> Result<CompileOutcome, CompilerError> {
		{
			let mut inner = self.inner.lock().await;
			if inner.state != RunState::Idle {
				return Err(CompilerError::Busy);
			}
			inner.state = inner.state.apply(RunCommand::CompileRequested);
		}

		self.console.clear();

		// The editor buffer must be durable and reconciled before the
		// toolchain reads it.
		if let Err(e) = self.sync.wait_for_sync(project).await {
			self.finish_run().await;
			return Err(e.into());
		}

		let result = self
			.socket
			.call(
				OP_COMPILE_RUN,
				json!({
					"project": project,
					"question": question,
					"file": file,
					"test": test,
				}),
			)
			.await;

		let value = match result {
			Ok(value) => value,
			Err(e) => {
				self.finish_run().await;
				return Err(e.into());
			}
		};

		let outcome: CompileOutcome = match serde_json::from_value(value) {
			Ok(outcome) => outcome,
			Err(e) => {
				self.finish_run().await;
				return Err(CompilerError::Protocol(e.to_string()));
			}
		};

		self.console.render_diagnostics(&outcome.messages);
		{
			let mut inner = self.inner.lock().await;
			inner.diagnostics = outcome.messages.clone();
		}

		match (&outcome.status, &outcome.session) {
			(CompileStatus::Running, Some(session)) => {
				let pushes = match self.socket.subscribe(session).await {
					Ok(pushes) => pushes,
					Err(e) => {
						self.finish_run().await;
						return Err(e.into());
					}
				};

				let mut inner = self.inner.lock().await;
				inner.session = Some(session.clone());
				inner.state = inner.state.apply(RunCommand::RunStarted);
				inner.pump = Some(tokio::spawn(pump_session(
					self.inner.clone(),
					self.console.clone(),
					self.socket.clone(),
					session.clone(),
					pushes,
				)));

				info!(session = %session, "execution started");
			}
			_ => {
				debug!(status = ?outcome.status, "execution did not start");
				self.finish_run().await;
			}
		}

		Ok(outcome)
	}

	/// Request termination of the running program. The state returns to
	/// idle unconditionally, even when the kill request itself fails.
	pub async fn stop(&self) -> Result<(), CompilerError> {
		let session = {
			let mut inner = self.inner.lock().await;
			inner.state = inner.state.apply(RunCommand::StopRequested);
			if let Some(pump) = inner.pump.take() {
				pump.abort();
			}
			inner.session.take()
		};

		let Some(session) = session else {
			return Ok(());
		};

		let result = self
			.socket
			.call(OP_PROGRAM_KILL, json!({ "session": session }))
			.await;
		self.socket.unsubscribe(&session).await;

		match result {
			Ok(_) => Ok(()),
			Err(e) => {
				warn!(session = %session, error = %e, "kill request failed");
				Err(e.into())
			}
		}
	}

	/// Start a cancellable poll for asynchronous external grading results
	/// on `target`. Resolves when the grader reports completion.
	pub fn poll_grading_results(&self, target: &str, poll_interval: Duration) -> GradingPoll {
		poll_grading(self.socket.clone(), target.to_string(), poll_interval)
	}

	async fn finish_run(&self) {
		let mut inner = self.inner.lock().await;
		inner.state = inner.state.apply(RunCommand::RunFinished);
		inner.session = None;
	}
}

/// Forward one run session's pushes into the console until the terminal
/// `done` push (or the stream closing) ends the run.
async fn pump_session(
	inner: Arc<Mutex<FacadeInner>>,
	console: Arc<OutputAssembler>,
	socket: SocketClient,
	session: String,
	mut pushes: mpsc::UnboundedReceiver<Push>,
) {
	while let Some(push) = pushes.recv().await {
		let done = push.kind == PushKind::Done;
		console.handle_push(&push);
		if done {
			break;
		}
	}

	socket.unsubscribe(&session).await;

	let mut inner = inner.lock().await;
	inner.state = inner.state.apply(RunCommand::RunFinished);
	inner.session = None;
	inner.pump = None;

	info!(session = %session, "run finished");
}
