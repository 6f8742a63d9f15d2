// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::time::Duration;

/// Exponential reconnect backoff with a capped maximum interval and equal
/// jitter. Attempts are unbounded; the caller loops for as long as the
/// process lives.
#[derive(Debug, Clone)]
pub struct Backoff {
	pub initial: Duration,
	pub max: Duration,
}

impl Default for Backoff {
	fn default() -> Self {
		Self {
			initial: Duration::from_millis(500),
			max: Duration::from_secs(30),
		}
	}
}

impl Backoff {
	/// Delay before reconnect attempt `attempt` (0-based): the capped
	/// exponential, jittered into its upper half so simultaneous clients
	/// do not reconnect in lockstep.
	pub fn delay(&self, attempt: u32) -> Duration {
		let exp = self
			.initial
			.saturating_mul(2u32.saturating_pow(attempt.min(16)))
			.min(self.max);
		let half = exp / 2;
		half + Duration::from_millis(fastrand::u64(0..=half.as_millis() as u64))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn delay_stays_within_exponential_bounds() {
		let backoff = Backoff::default();
		for attempt in 0..10 {
			let exp = backoff
				.initial
				.saturating_mul(2u32.saturating_pow(attempt))
				.min(backoff.max);
			let delay = backoff.delay(attempt);
			assert!(delay >= exp / 2, "attempt {attempt}: {delay:?} below half");
			assert!(delay <= exp, "attempt {attempt}: {delay:?} above cap");
		}
	}

	#[test]
	fn delay_caps_at_max() {
		let backoff = Backoff {
			initial: Duration::from_millis(100),
			max: Duration::from_secs(5),
		};
		for attempt in [10, 16, 100, u32::MAX] {
			assert!(backoff.delay(attempt) <= backoff.max);
		}
	}
}
