// Copyright 2024-2025 Irreducible Inc.

use num_bigint::BigUint;

use super::{ConstraintId, ScopeId, SignalId};

/// A malformed constraint model. Structural errors abort verification before any task runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
	#[error("constraint {constraint} references signal index {signal}, but the model has {n_signals} signals")]
	DanglingSignal {
		constraint: ConstraintId,
		signal: usize,
		n_signals: usize,
	},

	#[error("scope index {scope} does not exist, the model has {n_scopes} scopes")]
	DanglingScope { scope: usize, n_scopes: usize },

	#[error("scope {scope} is its own ancestor")]
	CyclicScope { scope: ScopeId },

	#[error("field mismatch: expected prime {expected}, the model declares {got}")]
	FieldMismatch { expected: BigUint, got: BigUint },

	#[error("constraint {constraint} assigns {signal}, which does not occur in it")]
	AssignedSignalAbsent {
		constraint: ConstraintId,
		signal: SignalId,
	},

	#[error("signal {signal} is an input or a fixed signal and cannot be assigned")]
	AssignedParameter { signal: SignalId },

	#[error("constraint {constraint} has a coefficient outside the canonical range of the field")]
	NonCanonicalCoefficient { constraint: ConstraintId },

	#[error("R1CS factor {factor} is not linear")]
	NonLinearFactor { factor: char },

	#[error("dependency graph disagrees with constraint {constraint} on signal {signal}")]
	InconsistentGraph {
		constraint: ConstraintId,
		signal: SignalId,
	},

	#[error("dependency graph covers {n_signals} signals and {n_constraints} constraints, which does not match the model")]
	GraphSize {
		n_signals: usize,
		n_constraints: usize,
	},

	#[error("witness has {got} values, the model has {expected} signals")]
	WitnessLength { expected: usize, got: usize },

	#[error("field error: {0}")]
	Field(#[from] safecirc_field::Error),
}
