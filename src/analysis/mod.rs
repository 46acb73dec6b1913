// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Analysis module - turns events and aggregates into human-readable summaries

mod summary;

pub use summary::*;
