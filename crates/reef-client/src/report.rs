// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::error;

/// External sink for failure reports (a crash/diagnostics backend). The
/// reporter forwards every failure here regardless of whether the user
/// already saw it.
pub trait DiagnosticsCollector: Send + Sync {
	fn record(&self, summary: &str);
}

/// Once-only user surfacing for generic failures.
///
/// The same failure can fire from a retry loop many times; the user should
/// read it once. Deduplication is by rendered message, mirroring how the
/// surrounding code reports errors. Nothing here is fatal; the caller
/// stays usable and can retry.
#[derive(Clone, Default)]
pub struct ErrorReporter {
	shown: Arc<Mutex<HashSet<String>>>,
	collector: Option<Arc<dyn DiagnosticsCollector>>,
}

impl ErrorReporter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_collector(collector: Arc<dyn DiagnosticsCollector>) -> Self {
		Self {
			shown: Arc::new(Mutex::new(HashSet::new())),
			collector: Some(collector),
		}
	}

	/// Report a failure. Returns the message to display if the user has
	/// not seen this one yet, `None` if it was already shown. The
	/// diagnostics collector receives every report either way.
	pub fn surface(&self, failure: &dyn fmt::Display) -> Option<String> {
		let message = failure.to_string();

		error!(%message, "reported failure");
		if let Some(collector) = &self.collector {
			collector.record(&message);
		}

		let mut shown = match self.shown.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		if shown.insert(message.clone()) {
			Some(message)
		} else {
			None
		}
	}
}
