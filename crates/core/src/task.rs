// Copyright 2024-2025 Irreducible Inc.

//! Verification tasks and their canonical local form.

use std::{collections::HashMap, sync::Arc};

use safecirc_field::{Fp, PrimeField};
use safecirc_math::SparsePolynomial;

use crate::{
	constraint_system::{ConstraintId, ConstraintModel, SignalId},
	verdict::{LocalWitnessPair, WitnessPair},
};

/// Role of a signal inside one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalRole {
	/// Shared by both solutions of a witness pair.
	Parameter,
	/// Free to differ between the two solutions.
	Unknown,
}

/// A task with its signals relabelled canonically.
///
/// Label 0 is the target. The other labels are assigned in order of first appearance, walking
/// the closure constraints in id order and the variables of each constraint in increasing
/// order. Two tasks arising from instantiations of the same component produce equal local
/// systems, which makes this type the memoization key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalSystem {
	roles: Vec<LocalRole>,
	constraints: Vec<SparsePolynomial>,
}

impl LocalSystem {
	pub fn new(roles: Vec<LocalRole>, constraints: Vec<SparsePolynomial>) -> Self {
		debug_assert!(!roles.is_empty());
		debug_assert!(constraints
			.iter()
			.flat_map(SparsePolynomial::variables)
			.all(|var| var < roles.len()));
		Self { roles, constraints }
	}

	/// Label of the target signal.
	pub const TARGET: usize = 0;

	pub fn n_signals(&self) -> usize {
		self.roles.len()
	}

	pub fn roles(&self) -> &[LocalRole] {
		&self.roles
	}

	pub fn role(&self, label: usize) -> LocalRole {
		self.roles[label]
	}

	pub fn is_parameter(&self, label: usize) -> bool {
		self.roles[label] == LocalRole::Parameter
	}

	pub fn constraints(&self) -> &[SparsePolynomial] {
		&self.constraints
	}

	/// Labels of the unknown signals, the target first.
	pub fn unknowns(&self) -> impl Iterator<Item = usize> + '_ {
		(0..self.roles.len()).filter(|&label| !self.is_parameter(label))
	}

	/// Labels of the parameters.
	pub fn parameters(&self) -> impl Iterator<Item = usize> + '_ {
		(0..self.roles.len()).filter(|&label| self.is_parameter(label))
	}

	/// Checks that a witness pair is a genuine counter-example: both assignments satisfy every
	/// constraint, they agree on the parameters and differ on the target.
	pub fn check_witness_pair(&self, field: &PrimeField, pair: &LocalWitnessPair) -> bool {
		let n = self.n_signals();
		if pair.first.len() != n || pair.second.len() != n {
			return false;
		}
		if pair.first[Self::TARGET] == pair.second[Self::TARGET] {
			return false;
		}
		if self
			.parameters()
			.any(|label| pair.first[label] != pair.second[label])
		{
			return false;
		}
		[&pair.first, &pair.second].into_iter().all(|values| {
			self.constraints.iter().all(|poly| {
				poly.evaluate(field, |var| values.get(var).cloned())
					.is_ok_and(|value| value.is_zero())
			})
		})
	}
}

/// Deciding whether one target signal is uniquely determined by its parameters.
#[derive(Debug, Clone)]
pub struct VerificationTask {
	pub target: SignalId,
	pub cluster: usize,
	pub closure: Vec<ConstraintId>,
	/// Model signal of each local label.
	pub signals: Vec<SignalId>,
	pub local: Arc<LocalSystem>,
}

impl VerificationTask {
	/// Builds the task for `target` over `closure`, where `is_parameter` tells which signals
	/// are already determined.
	pub fn new(
		model: &ConstraintModel,
		target: SignalId,
		cluster: usize,
		closure: Vec<ConstraintId>,
		mut is_parameter: impl FnMut(SignalId) -> bool,
	) -> Self {
		let mut label_of = HashMap::new();
		let mut signals = vec![target];
		label_of.insert(target, 0);
		for &id in &closure {
			for signal in model.constraint(id).variables() {
				label_of.entry(signal).or_insert_with(|| {
					signals.push(signal);
					signals.len() - 1
				});
			}
		}

		let field = model.field();
		let constraints = closure
			.iter()
			.map(|&id| {
				model
					.constraint(id)
					.poly()
					.map_variables(field, |var| label_of[&SignalId::from_index(var)])
			})
			.collect();
		let roles = signals
			.iter()
			.enumerate()
			.map(|(label, &signal)| {
				if label != LocalSystem::TARGET && is_parameter(signal) {
					LocalRole::Parameter
				} else {
					LocalRole::Unknown
				}
			})
			.collect();

		Self {
			target,
			cluster,
			closure,
			signals,
			local: Arc::new(LocalSystem::new(roles, constraints)),
		}
	}

	/// Model signals treated as parameters, in label order.
	pub fn parameters(&self) -> impl Iterator<Item = SignalId> + '_ {
		self.local.parameters().map(|label| self.signals[label])
	}

	/// Model signals treated as unknowns, the target first.
	pub fn unknowns(&self) -> impl Iterator<Item = SignalId> + '_ {
		self.local.unknowns().map(|label| self.signals[label])
	}

	/// Maps a local witness pair back to model signals.
	pub fn globalize(&self, pair: LocalWitnessPair) -> WitnessPair {
		let label = |values: Vec<Fp>| {
			self.signals
				.iter()
				.copied()
				.zip(values)
				.collect()
		};
		WitnessPair {
			first: label(pair.first),
			second: label(pair.second),
		}
	}
}

#[cfg(test)]
mod tests {
	use num_bigint::BigUint;

	use super::*;

	fn field() -> PrimeField {
		PrimeField::new(BigUint::from(101u32)).unwrap()
	}

	/// Two copies of `out <== a * b` over disjoint signals.
	fn duplicated() -> (ConstraintModel, [SignalId; 6]) {
		let mut model = ConstraintModel::new(field());
		let mut ids = Vec::new();
		for i in 0..2 {
			let a = model.add_input(format!("a{i}"));
			let b = model.add_input(format!("b{i}"));
			let out = model.add_output(format!("out{i}"));
			model.assign(out, a * b).unwrap();
			ids.extend([a, b, out]);
		}
		(model, ids.try_into().unwrap())
	}

	#[test]
	fn test_identical_instances_share_a_local_system() {
		let (model, [_, _, out0, _, _, out1]) = duplicated();
		let is_parameter = |signal: SignalId| model.signal(signal).role.is_parameter();
		let c = ConstraintId::from_index;
		let t0 = VerificationTask::new(&model, out0, 0, vec![c(0)], is_parameter);
		let t1 = VerificationTask::new(&model, out1, 1, vec![c(1)], is_parameter);
		assert_eq!(t0.local, t1.local);
		assert_ne!(t0.signals, t1.signals);
		assert_eq!(t0.local.n_signals(), 3);
		assert_eq!(t0.unknowns().collect::<Vec<_>>(), vec![out0]);
		assert_eq!(t0.parameters().count(), 2);
	}

	#[test]
	fn test_roles_change_the_local_system() {
		let (model, [a0, _, out0, _, _, _]) = duplicated();
		let closure = vec![ConstraintId::from_index(0)];
		let t0 = VerificationTask::new(&model, out0, 0, closure.clone(), |s| s == a0);
		let t1 = VerificationTask::new(&model, out0, 0, closure, |_| false);
		assert_ne!(t0.local, t1.local);
	}

	#[test]
	fn test_witness_pair_check() {
		let field = field();
		let (model, [_, _, out0, _, _, _]) = duplicated();
		let task = VerificationTask::new(&model, out0, 0, vec![ConstraintId::from_index(0)], |s| {
			model.signal(s).role.is_parameter()
		});
		// Labels: out0, a0, b0.
		let v = |values: [u64; 3]| values.map(|v| field.from_u64(v)).to_vec();
		let same_target = LocalWitnessPair {
			first: v([6, 2, 3]),
			second: v([6, 2, 3]),
		};
		assert!(!task.local.check_witness_pair(&field, &same_target));

		let unsatisfied = LocalWitnessPair {
			first: v([6, 2, 3]),
			second: v([7, 2, 3]),
		};
		assert!(!task.local.check_witness_pair(&field, &unsatisfied));

		let free = VerificationTask::new(&model, out0, 0, vec![], |_| true);
		let pair = LocalWitnessPair {
			first: vec![field.zero()],
			second: vec![field.one()],
		};
		assert!(free.local.check_witness_pair(&field, &pair));
		let global = free.globalize(pair);
		assert_eq!(global.differing_signals().collect::<Vec<_>>(), vec![out0]);
	}
}
