// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Compile/run orchestration for the reef client.
//!
//! The facade drives a run end to end: settle storage sync, issue the
//! compile request, publish diagnostics, and pump the run session's push
//! stream into the console assembler, all while tracking the
//! idle/compiling/running lifecycle. It also hosts the cancellable poll
//! loop for asynchronous external grading results.

mod error;
mod facade;
mod poll;
mod state;

pub use error::CompilerError;
pub use facade::CompilerFacade;
pub use poll::GradingPoll;
pub use state::{RunCommand, RunState};
