// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

/// A single-slot deferred callback with explicit reset and cancel.
///
/// Arming an already-armed debounce replaces the scheduled callback; the
/// previous one never fires. The owning component holds the handle as its
/// own mutable state; nothing else can reset or cancel it.
#[derive(Debug, Default)]
pub struct Debounce {
	handle: Option<JoinHandle<()>>,
}

impl Debounce {
	pub fn new() -> Self {
		Self { handle: None }
	}

	/// Schedule `callback` to run after `delay`, replacing any callback
	/// scheduled earlier.
	pub fn arm<F>(&mut self, delay: Duration, callback: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		self.cancel();
		trace!(delay_ms = delay.as_millis() as u64, "debounce armed");
		self.handle = Some(tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			callback.await;
		}));
	}

	/// Drop the scheduled callback, if any, without running it.
	pub fn cancel(&mut self) {
		if let Some(handle) = self.handle.take() {
			handle.abort();
		}
	}

	/// True while a callback is scheduled and has not yet run.
	pub fn is_armed(&self) -> bool {
		self.handle.as_ref().is_some_and(|h| !h.is_finished())
	}
}

impl Drop for Debounce {
	fn drop(&mut self) {
		self.cancel();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	#[tokio::test(start_paused = true)]
	async fn fires_after_delay() {
		let fired = Arc::new(AtomicUsize::new(0));
		let mut debounce = Debounce::new();

		let f = fired.clone();
		debounce.arm(Duration::from_millis(100), async move {
			f.fetch_add(1, Ordering::SeqCst);
		});

		tokio::time::sleep(Duration::from_millis(150)).await;
		assert_eq!(fired.load(Ordering::SeqCst), 1);
		assert!(!debounce.is_armed());
	}

	#[tokio::test(start_paused = true)]
	async fn rearm_replaces_previous_callback() {
		let fired = Arc::new(AtomicUsize::new(0));
		let mut debounce = Debounce::new();

		for _ in 0..3 {
			let f = fired.clone();
			debounce.arm(Duration::from_millis(100), async move {
				f.fetch_add(1, Ordering::SeqCst);
			});
			tokio::time::sleep(Duration::from_millis(50)).await;
		}

		tokio::time::sleep(Duration::from_millis(100)).await;
		assert_eq!(fired.load(Ordering::SeqCst), 1, "only the last arm fires");
	}

	#[tokio::test(start_paused = true)]
	async fn cancel_prevents_firing() {
		let fired = Arc::new(AtomicUsize::new(0));
		let mut debounce = Debounce::new();

		let f = fired.clone();
		debounce.arm(Duration::from_millis(100), async move {
			f.fetch_add(1, Ordering::SeqCst);
		});
		debounce.cancel();

		tokio::time::sleep(Duration::from_millis(200)).await;
		assert_eq!(fired.load(Ordering::SeqCst), 0);
		assert!(!debounce.is_armed());
	}

	#[tokio::test(start_paused = true)]
	async fn is_armed_reflects_schedule() {
		let mut debounce = Debounce::new();
		assert!(!debounce.is_armed());

		debounce.arm(Duration::from_millis(100), async {});
		assert!(debounce.is_armed());

		tokio::time::sleep(Duration::from_millis(150)).await;
		assert!(!debounce.is_armed());
	}
}
