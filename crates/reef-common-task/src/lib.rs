// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Scheduled-callback primitives shared across the reef client.

mod debounce;

pub use debounce::Debounce;
