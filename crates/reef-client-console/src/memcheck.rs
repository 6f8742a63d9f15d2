// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Structured memory-safety diagnostic reports, as attached to a finished
//! run or test by the sanitizer on the remote side.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct AsanReport {
	#[serde(default)]
	pub error_type: String,
	#[serde(default)]
	pub raw_message: String,
	#[serde(default)]
	pub call_stacks: Vec<CallStack>,
	#[serde(default)]
	pub misc: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallStack {
	#[serde(default)]
	pub framelist: Vec<Frame>,
	#[serde(default)]
	pub misc: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
	pub frame: u32,
	pub function: String,
	pub line: u32,
	#[serde(default)]
	pub column: Option<u32>,
}

/// Parse the raw JSON report attached to a push payload. A payload the
/// client cannot parse renders nothing rather than failing the run.
pub fn parse(raw: &str) -> Option<AsanReport> {
	match serde_json::from_str(raw) {
		Ok(report) => Some(report),
		Err(e) => {
			debug!(error = %e, "unparseable memory-diagnostic payload");
			None
		}
	}
}

/// Human-readable rendering: error-type header, captured call stacks frame
/// by frame, then auxiliary metadata with underscores shown as spaces. An
/// `unknown` error type with no raw message renders nothing at all.
pub fn render(report: &AsanReport) -> String {
	if report.error_type == "unknown" && report.raw_message.is_empty() {
		return String::new();
	}

	let mut out = format!(
		"Memory error occurred! Type of error: {}\n",
		report.error_type
	);

	if report.call_stacks.is_empty() {
		// No decoded stack came back; show what the sanitizer said.
		out += "Raw error message:\n";
		out += &report.raw_message;
	}

	for stack in &report.call_stacks {
		for frame in &stack.framelist {
			out += &format!(
				"  frame {}: function {} in line {}",
				frame.frame, frame.function, frame.line
			);
			if let Some(column) = frame.column {
				out += &format!(", column {column}");
			}
			out += "\n";
		}
		for (key, value) in &stack.misc {
			out += &format!("  {}: {}\n", key.replace('_', " "), misc_value(value));
		}
	}

	for (key, value) in &report.misc {
		out += &format!("{}: {}\n", key.replace('_', " "), misc_value(value));
	}

	out
}

fn misc_value(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn unknown_without_message_renders_nothing() {
		let report = parse(&json!({"error_type": "unknown", "raw_message": ""}).to_string())
			.expect("parse");
		assert_eq!(render(&report), "");
	}

	#[test]
	fn missing_stacks_fall_back_to_raw_message() {
		let report = parse(
			&json!({
				"error_type": "heap-buffer-overflow",
				"raw_message": "READ of size 4",
				"call_stacks": []
			})
			.to_string(),
		)
		.expect("parse");

		let rendered = render(&report);
		assert!(rendered.starts_with(
			"Memory error occurred! Type of error: heap-buffer-overflow\n"
		));
		assert!(rendered.contains("Raw error message:\nREAD of size 4"));
	}

	#[test]
	fn frames_render_with_optional_column() {
		let report = parse(
			&json!({
				"error_type": "stack-use-after-return",
				"raw_message": "x",
				"call_stacks": [{
					"framelist": [
						{"frame": 0, "function": "main", "line": 12, "column": 3},
						{"frame": 1, "function": "helper", "line": 40}
					],
					"misc": {"shadow_bytes": "fa fa"}
				}],
				"misc": {"allocation_size": 16}
			})
			.to_string(),
		)
		.expect("parse");

		let rendered = render(&report);
		assert!(rendered.contains("  frame 0: function main in line 12, column 3\n"));
		assert!(rendered.contains("  frame 1: function helper in line 40\n"));
		assert!(rendered.contains("  shadow bytes: fa fa\n"), "underscores become spaces");
		assert!(rendered.contains("allocation size: 16\n"));
		assert!(
			!rendered.contains("Raw error message"),
			"raw fallback only when no stacks"
		);
	}

	#[test]
	fn garbage_payload_parses_to_none() {
		assert!(parse("not json").is_none());
	}
}
