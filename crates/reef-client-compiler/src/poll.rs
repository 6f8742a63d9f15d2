// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::time::Duration;

use reef_client_socket::protocol::{GradingReport, OP_GRADING_RESULTS};
use reef_client_socket::SocketClient;
use serde_json::json;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::error::CompilerError;

/// A running external-grading poll. The caller holds this as its
/// cancellation handle; dropping it or calling [`cancel`](Self::cancel)
/// stops the loop.
pub struct GradingPoll {
	handle: JoinHandle<()>,
	rx: Option<oneshot::Receiver<GradingReport>>,
}

impl GradingPoll {
	/// Resolve with the completed report, or with
	/// [`CompilerError::PollCancelled`] if the poll was cancelled first.
	pub async fn wait(mut self) -> Result<GradingReport, CompilerError> {
		let rx = self.rx.take().ok_or(CompilerError::PollCancelled)?;
		rx.await.map_err(|_| CompilerError::PollCancelled)
	}

	pub fn cancel(&self) {
		self.handle.abort();
	}
}

impl Drop for GradingPoll {
	fn drop(&mut self) {
		self.handle.abort();
	}
}

/// Re-fetch grading results for `target` on a fixed interval until the
/// report signals completion. Failed attempts (transport hiccups,
/// not-yet-available results) keep polling; only completion resolves.
pub fn poll_grading(socket: SocketClient, target: String, poll_interval: Duration) -> GradingPoll {
	let (tx, rx) = oneshot::channel();

	let handle = tokio::spawn(async move {
		let mut ticker = interval(poll_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			ticker.tick().await;

			let value = match socket
				.call(OP_GRADING_RESULTS, json!({ "target": target }))
				.await
			{
				Ok(value) => value,
				Err(e) => {
					debug!(target = %target, error = %e, "grading poll attempt failed");
					continue;
				}
			};

			match serde_json::from_value::<GradingReport>(value) {
				Ok(report) if report.is_complete() => {
					let _ = tx.send(report);
					break;
				}
				Ok(_) => {}
				Err(e) => debug!(target = %target, error = %e, "malformed grading report"),
			}
		}
	});

	GradingPoll {
		handle,
		rx: Some(rx),
	}
}
