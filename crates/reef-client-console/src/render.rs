// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::OnceLock;

use regex::Regex;
use reef_client_socket::protocol::{Diagnostic, TestOutcome, TestVerdict};

use crate::memcheck;

pub(crate) const SEPARATOR: &str = "----------------------------------\n";

const BLACK: u8 = 0;
const RED: u8 = 1;
const GREEN: u8 = 2;

fn wrap_colour(text: &str, colour: u8) -> String {
	format!("\x1B[1;3{colour}m{text}\x1B[0m")
}

/// One test-result block: separator, coloured verdict line, then the
/// produced output for anything that did not pass, the expectation only
/// for `failed`, stderr when non-empty, and the memory-diagnostic report
/// when one came back non-empty.
pub fn render_test(outcome: &TestOutcome) -> String {
	let mut out = String::from(SEPARATOR);

	let name = &outcome.test_name;
	out += &match outcome.result {
		TestVerdict::Passed => wrap_colour(&format!("Test \"{name}\" passed.\n"), GREEN),
		TestVerdict::Failed => wrap_colour(&format!("Test \"{name}\" failed.\n"), RED),
		TestVerdict::Error => {
			wrap_colour(&format!("Test \"{name}\" caused an error!\n"), RED)
		}
		TestVerdict::NoExpect => {
			wrap_colour(&format!("Test \"{name}\" completed.\n"), BLACK)
		}
		TestVerdict::Timeout => wrap_colour(&format!("Test \"{name}\" timed out.\n"), RED),
		TestVerdict::Killed => wrap_colour(&format!("Test \"{name}\" was killed.\n"), BLACK),
	};

	if outcome.result != TestVerdict::Passed {
		out += "Produced output (stdout):\n";
		out += &outcome.stdout;
	}
	if outcome.result == TestVerdict::Failed {
		out += "Expected output (stdout):\n";
		out += outcome.expected.as_deref().unwrap_or_default();
	}
	if !outcome.stderr.is_empty() {
		out += "Produced errors (stderr):\n";
		out += &outcome.stderr;
	}
	if let Some(raw) = outcome.asan_output.as_deref() {
		if let Some(report) = memcheck::parse(raw) {
			if !report.raw_message.is_empty() {
				out += "AddressSanitizer Output:\n";
				out += &memcheck::render(&report);
			}
		}
	}

	out
}

/// Compiler diagnostics, `file:line:column: message` in input order.
/// Classified warnings-only when no entry is flagged as an error; the two
/// known-spurious linker messages are dropped before rendering. Returns
/// `None` for an empty list.
pub fn render_diagnostics(diagnostics: &[Diagnostic]) -> Option<String> {
	if diagnostics.is_empty() {
		return None;
	}

	let warnings_only = diagnostics.iter().all(|d| !d.error);
	let mut out = String::from(if warnings_only {
		"Compilation generated warnings:\n"
	} else {
		"Compilation failed with errors:\n"
	});

	for diagnostic in diagnostics
		.iter()
		.filter(|d| !is_spurious_linker_noise(&d.message))
	{
		out += &format!(
			"{}:{}:{}: {}\n",
			diagnostic.file, diagnostic.line, diagnostic.column, diagnostic.message
		);
	}

	Some(out)
}

// The toolchain links without a runtime entry point, so every build trips
// these two messages; they carry no information about the user's code.
fn is_spurious_linker_noise(message: &str) -> bool {
	static RELOCATION: OnceLock<Regex> = OnceLock::new();
	let relocation = RELOCATION.get_or_init(|| {
		Regex::new(r"relocation \d+ has invalid symbol index \d+$").expect("static pattern")
	});

	message.ends_with("In function `_start':") || relocation.is_match(message)
}
