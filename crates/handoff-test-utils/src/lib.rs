// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for handoff integration tests.
//!
//! # Components
//!
//! - [`MockTransport`] - Captures forwards and replies, with failure injection
//! - [`TestHarness`] - A relay wired for either routing mode over either backend

pub mod harness;
pub mod mock_transport;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_transport::{MockTransport, SentMessage};
