// Copyright 2024-2025 Irreducible Inc.

use std::{collections::BTreeMap, fmt};

use safecirc_field::Fp;
use safecirc_math::TermOrder;
use serde::{Deserialize, Serialize};

use crate::constraint_system::SignalId;

/// The closed set of sound syntactic rules, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HeuristicRule {
	/// The target occurs in no constraint.
	FreeSignal,
	/// The closure is a linear system, solved by elimination.
	LinearSystem,
	/// A constraint is linear in the target and mentions no other unknown.
	DirectAssignment,
	/// A boolean target recovered from a binary decomposition of determined values.
	BooleanDecomposition,
}

impl HeuristicRule {
	pub const ALL: [Self; 4] = [
		Self::FreeSignal,
		Self::LinearSystem,
		Self::DirectAssignment,
		Self::BooleanDecomposition,
	];
}

impl fmt::Display for HeuristicRule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::FreeSignal => "free-signal",
			Self::LinearSystem => "linear-system",
			Self::DirectAssignment => "direct-assignment",
			Self::BooleanDecomposition => "boolean-decomposition",
		};
		f.write_str(name)
	}
}

/// Facts recorded when the doubled ideal is proven to be the unit ideal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Certificate {
	pub order: TermOrder,
	/// Number of ring variables, including the doubled unknowns and the auxiliary variable.
	pub n_vars: usize,
	pub n_generators: usize,
	pub pairs_reduced: usize,
	/// Largest total degree seen while computing the basis.
	pub max_degree: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SafeEvidence {
	Heuristic(HeuristicRule),
	Algebraic(Certificate),
	/// The model admits no assignment at all, so no two assignments can differ.
	NoAssignment,
}

/// Why a task ended without a definite answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnknownReason {
	Timeout,
	ResourceLimit,
	Fault,
	NoApplicableRule,
	NoWitnessFound,
	Cancelled,
	/// The run stopped before reaching the task.
	Skipped,
}

impl UnknownReason {
	/// Whether a verdict with this reason may be stored and reused for an identical task.
	///
	/// Cancellation and faults describe the run rather than the task. Timeouts depend on wall
	/// clock time and machine load, so a later identical task gets a fresh attempt.
	pub const fn is_cacheable(self) -> bool {
		!matches!(self, Self::Timeout | Self::Cancelled | Self::Fault | Self::Skipped)
	}
}

impl fmt::Display for UnknownReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let reason = match self {
			Self::Timeout => "timeout",
			Self::ResourceLimit => "resource limit",
			Self::Fault => "solver fault",
			Self::NoApplicableRule => "no applicable rule",
			Self::NoWitnessFound => "no witness found",
			Self::Cancelled => "cancelled",
			Self::Skipped => "skipped",
		};
		f.write_str(reason)
	}
}

/// Two assignments of a task's local signals, indexed by local label.
///
/// Both satisfy every closure constraint, agree on every parameter and differ on the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalWitnessPair {
	pub first: Vec<Fp>,
	pub second: Vec<Fp>,
}

/// A witness pair over the signals of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessPair {
	pub first: BTreeMap<SignalId, Fp>,
	pub second: BTreeMap<SignalId, Fp>,
}

impl WitnessPair {
	/// The signals on which the two assignments differ.
	pub fn differing_signals(&self) -> impl Iterator<Item = SignalId> + '_ {
		self.first
			.iter()
			.filter(|(signal, value)| self.second.get(signal) != Some(value))
			.map(|(&signal, _)| signal)
	}
}

/// Outcome of a safety check, generic over the shape of its counter-example.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict<W> {
	Safe(SafeEvidence),
	Unsafe(W),
	Unknown(UnknownReason),
}

pub type LocalVerdict = Verdict<LocalWitnessPair>;
pub type TaskVerdict = Verdict<WitnessPair>;

impl<W> Verdict<W> {
	pub const fn is_safe(&self) -> bool {
		matches!(self, Self::Safe(_))
	}

	pub const fn is_unsafe(&self) -> bool {
		matches!(self, Self::Unsafe(_))
	}

	pub const fn is_unknown(&self) -> bool {
		matches!(self, Self::Unknown(_))
	}

	pub fn map_witness<V>(self, f: impl FnOnce(W) -> V) -> Verdict<V> {
		match self {
			Self::Safe(evidence) => Verdict::Safe(evidence),
			Self::Unsafe(witness) => Verdict::Unsafe(f(witness)),
			Self::Unknown(reason) => Verdict::Unknown(reason),
		}
	}

	pub fn kind(&self) -> CircuitVerdict {
		match self {
			Self::Safe(_) => CircuitVerdict::Safe,
			Self::Unsafe(_) => CircuitVerdict::Unsafe,
			Self::Unknown(_) => CircuitVerdict::Unknown,
		}
	}
}

/// The verdict on a whole circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitVerdict {
	Safe,
	Unsafe,
	Unknown,
}

impl CircuitVerdict {
	/// Unsafe dominates Unknown, which dominates Safe. The empty conjunction is Safe.
	pub fn combine(verdicts: impl IntoIterator<Item = Self>) -> Self {
		verdicts
			.into_iter()
			.fold(Self::Safe, |acc, verdict| match (acc, verdict) {
				(Self::Unsafe, _) | (_, Self::Unsafe) => Self::Unsafe,
				(Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
				_ => Self::Safe,
			})
	}
}

impl fmt::Display for CircuitVerdict {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Safe => "safe",
			Self::Unsafe => "unsafe",
			Self::Unknown => "unknown",
		};
		f.write_str(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_combine() {
		use CircuitVerdict::*;
		assert_eq!(CircuitVerdict::combine([]), Safe);
		assert_eq!(CircuitVerdict::combine([Safe, Safe]), Safe);
		assert_eq!(CircuitVerdict::combine([Safe, Unknown, Safe]), Unknown);
		assert_eq!(CircuitVerdict::combine([Unknown, Unsafe, Safe]), Unsafe);
		assert_eq!(CircuitVerdict::combine([Unsafe, Unknown]), Unsafe);
	}

	#[test]
	fn test_map_witness() {
		let verdict: Verdict<u32> = Verdict::Unsafe(3);
		assert_eq!(verdict.map_witness(|w| w * 2), Verdict::Unsafe(6));
		let verdict: Verdict<u32> = Verdict::Unknown(UnknownReason::Timeout);
		assert_eq!(verdict.map_witness(|w| w * 2), Verdict::Unknown(UnknownReason::Timeout));
	}

	#[test]
	fn test_cacheable_reasons() {
		assert!(UnknownReason::ResourceLimit.is_cacheable());
		assert!(UnknownReason::NoWitnessFound.is_cacheable());
		assert!(!UnknownReason::Timeout.is_cacheable());
		assert!(!UnknownReason::Cancelled.is_cacheable());
		assert!(!UnknownReason::Fault.is_cacheable());
	}

	#[test]
	fn test_differing_signals() {
		let s = SignalId::from_index;
		let pair = WitnessPair {
			first: [(s(0), Fp::zero()), (s(1), Fp::one())].into(),
			second: [(s(0), Fp::zero()), (s(1), Fp::zero())].into(),
		};
		assert_eq!(pair.differing_signals().collect::<Vec<_>>(), vec![s(1)]);
	}
}
