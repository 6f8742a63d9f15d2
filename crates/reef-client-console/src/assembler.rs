// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reef_client_socket::protocol::{
	Diagnostic, OutputChunk, Push, PushKind, RunDone, TestOutcome,
};
use reef_common_task::Debounce;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::memcheck;
use crate::render;

const IDLE_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Display-ready console updates, drained by the UI-layer collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
	Write(String),
	Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
	Stdout,
	Stderr,
}

struct Inner {
	stdout: String,
	stderr: String,
	idle: Debounce,
	tx: mpsc::UnboundedSender<ConsoleEvent>,
}

impl Inner {
	fn emit(&self, content: String) {
		if !content.is_empty() {
			let _ = self.tx.send(ConsoleEvent::Write(content));
		}
	}

	/// Emit whatever is buffered, newline-terminated or not, and clear.
	fn flush(&mut self) {
		let combined = format!("{}{}", self.stdout, self.stderr);
		self.stdout.clear();
		self.stderr.clear();
		self.emit(combined);
	}
}

/// Reassembles fragmented run output into ordered console writes.
///
/// Complete lines are emitted the moment they arrive. A trailing partial
/// line waits for more data, but never longer than the idle-flush
/// interval, so slow producers still appear promptly without the output
/// fragmenting character by character. The buffers and the idle timer are
/// owned here exclusively; nothing else mutates them.
pub struct OutputAssembler {
	inner: Arc<Mutex<Inner>>,
	idle_interval: Duration,
}

impl OutputAssembler {
	pub fn new() -> (Self, mpsc::UnboundedReceiver<ConsoleEvent>) {
		Self::with_idle_interval(IDLE_FLUSH_INTERVAL)
	}

	pub fn with_idle_interval(
		idle_interval: Duration,
	) -> (Self, mpsc::UnboundedReceiver<ConsoleEvent>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let assembler = Self {
			inner: Arc::new(Mutex::new(Inner {
				stdout: String::new(),
				stderr: String::new(),
				idle: Debounce::new(),
				tx,
			})),
			idle_interval,
		};
		(assembler, rx)
	}

	/// Append one fragment to its stream, emit any lines it completed, and
	/// reset the idle-flush timer.
	pub fn push_chunk(&self, stream: OutputStream, fragment: &str) {
		let mut inner = self.lock();

		let buffer = match stream {
			OutputStream::Stdout => &mut inner.stdout,
			OutputStream::Stderr => &mut inner.stderr,
		};
		buffer.push_str(fragment);

		if let Some(end) = buffer.rfind('\n') {
			let complete: String = buffer.drain(..=end).collect();
			inner.emit(complete);
		}

		let shared = Arc::clone(&self.inner);
		let interval = self.idle_interval;
		inner.idle.arm(interval, async move {
			if let Ok(mut inner) = shared.lock() {
				debug!("idle flush");
				inner.flush();
			}
		});
	}

	/// Terminal signal for a run: flush everything buffered, render the
	/// attached memory-diagnostic report if any, then report the exit code.
	pub fn finish(&self, status: i32, asan: Option<&str>) {
		let mut inner = self.lock();
		inner.idle.cancel();
		inner.flush();

		let mut out = String::new();
		if let Some(report) = asan.and_then(memcheck::parse) {
			out += &memcheck::render(&report);
		}
		out += &format!("Program finished with exit code {status}.\n");
		inner.emit(out);
	}

	pub fn render_test(&self, outcome: &TestOutcome) {
		let inner = self.lock();
		inner.emit(render::render_test(outcome));
	}

	pub fn render_diagnostics(&self, diagnostics: &[Diagnostic]) {
		if let Some(rendered) = render::render_diagnostics(diagnostics) {
			let inner = self.lock();
			inner.emit(rendered);
		}
	}

	/// Drop buffered partial output and tell the display to reset.
	pub fn clear(&self) {
		let mut inner = self.lock();
		inner.idle.cancel();
		inner.stdout.clear();
		inner.stderr.clear();
		let _ = inner.tx.send(ConsoleEvent::Clear);
	}

	/// Route one server push into the assembler. Payloads that fail to
	/// parse are dropped with a warning; one malformed frame must not
	/// wedge the stream.
	pub fn handle_push(&self, push: &Push) {
		match push.kind {
			PushKind::Stdout | PushKind::Stderr => {
				let stream = if push.kind == PushKind::Stdout {
					OutputStream::Stdout
				} else {
					OutputStream::Stderr
				};
				match serde_json::from_value::<OutputChunk>(push.payload.clone()) {
					Ok(chunk) => self.push_chunk(stream, &chunk.message),
					Err(e) => warn!(error = %e, "malformed output fragment"),
				}
			}
			PushKind::Done => match serde_json::from_value::<RunDone>(push.payload.clone()) {
				Ok(done) => self.finish(done.status, done.asan.as_deref()),
				Err(e) => warn!(error = %e, "malformed done payload"),
			},
			PushKind::TestResult => {
				match serde_json::from_value::<TestOutcome>(push.payload.clone()) {
					Ok(outcome) => self.render_test(&outcome),
					Err(e) => warn!(error = %e, "malformed test result"),
				}
			}
			PushKind::Diagnostics => {
				match serde_json::from_value::<Vec<Diagnostic>>(push.payload.clone()) {
					Ok(diagnostics) => self.render_diagnostics(&diagnostics),
					Err(e) => warn!(error = %e, "malformed diagnostics payload"),
				}
			}
		}
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
		match self.inner.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}
}
