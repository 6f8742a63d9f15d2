// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Wire the full client stack against a running backend: create a
//! project, add a file from its template, edit it, and stream the run's
//! console output to stdout.
//!
//! ```sh
//! REEF_SERVER_ADDR=127.0.0.1:4444 cargo run --example demo
//! ```

use reef_client::{ClientConfig, Context};
use reef_client_compiler::RunState;
use reef_client_console::ConsoleEvent;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let config = ClientConfig::load()?;
	let (context, mut console) = Context::init(config)?;

	let project = context.sync.create_project("demo").await?;
	let file = context.add_file(&project.id, "q1", "main.c").await?;

	context
		.sync
		.stage_write(
			&file.id,
			"#include <stdio.h>\nint main() {\n\tprintf(\"hello from reef\\n\");\n\treturn 0;\n}\n",
		)
		.await;

	context
		.compiler
		.compile_and_run(&project.id, "q1", &file.id, false)
		.await?;

	while let Some(event) = console.recv().await {
		match event {
			ConsoleEvent::Write(chunk) => print!("{chunk}"),
			ConsoleEvent::Clear => {}
		}
		if context.compiler.run_state().await == RunState::Idle {
			break;
		}
	}

	Ok(())
}
