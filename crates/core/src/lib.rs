// Copyright 2024-2025 Irreducible Inc.

//! Modular verification that the signals of an arithmetic circuit are uniquely determined by
//! its inputs.
//!
//! A [`ConstraintModel`] is split by [`decompose`] into clusters of mutually dependent signals.
//! Each output or intermediate signal becomes a verification task, which is decided by cheap
//! sound rules from [`heuristics`] when one applies and by the Gröbner basis procedure of
//! [`algebraic`] otherwise. The [`orchestrator`] schedules the tasks, memoizes verdicts of
//! identical local systems and combines everything into a [`VerificationReport`].

pub mod algebraic;
pub mod cache;
pub mod config;
pub mod constraint_system;
pub mod decompose;
mod error;
pub mod heuristics;
pub mod orchestrator;
pub mod report;
pub mod task;
pub mod verdict;

pub use config::{UnsafeCollection, VerifierConfig};
pub use constraint_system::{ConstraintModel, Expr, SignalId, SignalRole, StructuralError};
pub use error::Error;
pub use orchestrator::{verify, VerificationContext};
pub use report::VerificationReport;
pub use verdict::{CircuitVerdict, TaskVerdict, UnknownReason, Verdict};
