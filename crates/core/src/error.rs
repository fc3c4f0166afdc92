// Copyright 2024-2025 Irreducible Inc.

use crate::constraint_system::{circom::ImportError, StructuralError};

/// Errors that abort a verification run before or instead of producing a report.
///
/// Failures of individual tasks never surface here; they degrade to unknown verdicts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("malformed constraint model: {0}")]
	Structural(#[from] StructuralError),

	#[error("field error: {0}")]
	Field(#[from] safecirc_field::Error),

	#[error("failed to build the thread pool: {0}")]
	ThreadPool(#[from] rayon::ThreadPoolBuildError),

	#[error("import error: {0}")]
	Import(#[from] ImportError),
}
