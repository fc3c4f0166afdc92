// Copyright 2024-2025 Irreducible Inc.

//! Small shared helpers for the safecirc crates: early-return macros, environment flags,
//! tracing setup, thread pool construction and graph algorithms over dense node indices.

pub mod env;
pub mod error_utils;
pub mod graph;
pub mod rayon;
pub mod tracing;
