// Copyright 2024-2025 Irreducible Inc.

use std::{fmt, time::Duration};

/// The resource limit that stopped an algebraic computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
	Degree { max: u32, got: u32 },
	BasisLength { max: usize },
	Variables { max: usize, got: usize },
	Steps { max: u64 },
}

impl fmt::Display for Limit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Degree { max, got } => write!(f, "degree bound {max} (reached {got})"),
			Self::BasisLength { max } => write!(f, "basis length bound {max}"),
			Self::Variables { max, got } => write!(f, "variable bound {max} (ring has {got})"),
			Self::Steps { max } => write!(f, "step bound {max}"),
		}
	}
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
	#[error("computation exceeded its {limit}")]
	ResourceExhausted { limit: Limit },
	#[error("computation timed out after {elapsed:?}")]
	Timeout { elapsed: Duration },
	#[error("computation was cancelled")]
	Cancelled,
	#[error("variable x{var} is out of range for a ring with {n_vars} variables")]
	VariableOutOfRange { var: usize, n_vars: usize },
	#[error("no value was given for variable x{var}")]
	UnassignedVariable { var: usize },
	#[error("argument {arg} does not have expected length {expected}")]
	IncorrectArgumentLength { arg: String, expected: usize },
	#[error("{0}")]
	FieldError(#[from] safecirc_field::Error),
}

impl Error {
	/// Whether the error stems from the computation budget rather than from invalid input.
	pub const fn is_budget_exhaustion(&self) -> bool {
		matches!(self, Self::ResourceExhausted { .. } | Self::Timeout { .. } | Self::Cancelled)
	}
}
