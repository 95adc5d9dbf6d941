// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each function runs one closure (and at most one
//! transaction) on the writer thread.

pub mod connections;
pub mod users;
