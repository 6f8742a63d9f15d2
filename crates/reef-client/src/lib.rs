// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Top-level assembly of the reef client data layer.
//!
//! [`Context`] wires store, socket, sync engine, console assembler, and
//! compiler facade together exactly once at startup; everything downstream
//! receives the components it needs explicitly, with no global service
//! registry to race against. Configuration comes from a TOML file
//! under the XDG config directory with environment overrides, and
//! [`ErrorReporter`] gives failures a single user-visible surfacing plus a
//! feed to an external diagnostics collector.

mod config;
mod context;
mod error;
mod report;

pub use config::{ClientConfig, ConfigError};
pub use context::Context;
pub use error::ClientError;
pub use report::{DiagnosticsCollector, ErrorReporter};
