// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Persistent socket transport for the reef client.
//!
//! Provides ordered, reliable-looking request/response semantics over an
//! inherently unreliable long-lived TCP connection: correlation-id
//! multiplexing, per-request timeouts, FIFO queuing while disconnected,
//! jittered exponential-backoff reconnection, and per-session routing of
//! server-pushed messages.

mod backoff;
mod client;
mod error;
pub mod protocol;

pub use backoff::Backoff;
pub use client::{SocketClient, SocketConfig};
pub use error::SocketError;
