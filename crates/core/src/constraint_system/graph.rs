// Copyright 2024-2025 Irreducible Inc.

use std::collections::BTreeSet;

use safecirc_utils::{ensure, graph::connected_components};

use super::{error::StructuralError, ConstraintId, ConstraintModel, SignalId};

/// The bipartite incidence relation between signals and constraints of a model.
///
/// Both directions are stored as dense arenas indexed by id, with each list sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
	constraints_of: Vec<Vec<ConstraintId>>,
	signals_of: Vec<Vec<SignalId>>,
}

impl DependencyGraph {
	pub fn new(model: &ConstraintModel) -> Self {
		let mut constraints_of = vec![Vec::new(); model.n_signals()];
		let signals_of = model
			.constraints()
			.map(|(id, constraint)| {
				let signals = constraint.variables().collect::<Vec<_>>();
				for signal in &signals {
					constraints_of[signal.index()].push(id);
				}
				signals
			})
			.collect();
		Self {
			constraints_of,
			signals_of,
		}
	}

	pub fn n_signals(&self) -> usize {
		self.constraints_of.len()
	}

	pub fn n_constraints(&self) -> usize {
		self.signals_of.len()
	}

	/// Constraints in which `signal` occurs.
	pub fn constraints_of(&self, signal: SignalId) -> &[ConstraintId] {
		&self.constraints_of[signal.index()]
	}

	/// Signals occurring in `constraint`.
	pub fn signals_of(&self, constraint: ConstraintId) -> &[SignalId] {
		&self.signals_of[constraint.index()]
	}

	/// All constraints touching at least one of `signals`, in increasing order.
	pub fn closure(&self, signals: impl IntoIterator<Item = SignalId>) -> Vec<ConstraintId> {
		signals
			.into_iter()
			.flat_map(|signal| self.constraints_of(signal).iter().copied())
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect()
	}

	/// Splits the model into pieces that share no signal.
	pub fn components(&self) -> Components {
		let groups = self
			.signals_of
			.iter()
			.map(|signals| signals.iter().map(|signal| signal.index()).collect::<Vec<_>>())
			.collect::<Vec<_>>();
		let smallest = connected_components(self.n_signals(), &groups);

		// Components are numbered by their smallest signal.
		let mut component_of = vec![0; self.n_signals()];
		let mut position = vec![0; self.n_signals()];
		let mut signals = Vec::<Vec<SignalId>>::new();
		for (index, &min) in smallest.iter().enumerate() {
			let component = if min == index {
				signals.push(Vec::new());
				signals.len() - 1
			} else {
				component_of[min]
			};
			component_of[index] = component;
			position[index] = signals[component].len();
			signals[component].push(SignalId::from_index(index));
		}

		let mut constraints = vec![Vec::new(); signals.len()];
		let mut constant = Vec::new();
		for (index, members) in self.signals_of.iter().enumerate() {
			let id = ConstraintId::from_index(index);
			match members.first() {
				Some(signal) => constraints[component_of[signal.index()]].push(id),
				None => constant.push(id),
			}
		}
		Components {
			component_of,
			position,
			signals,
			constraints,
			constant,
		}
	}

	/// Checks that the incidence lists agree with the variable sets of the model's constraints.
	pub fn validate(&self, model: &ConstraintModel) -> Result<(), StructuralError> {
		ensure!(
			self.n_signals() == model.n_signals() && self.n_constraints() == model.n_constraints(),
			StructuralError::GraphSize {
				n_signals: self.n_signals(),
				n_constraints: self.n_constraints(),
			}
		);

		for (id, constraint) in model.constraints() {
			let expected = constraint.variables().collect::<Vec<_>>();
			let stored = self.signals_of(id);
			if let Some(signal) = expected
				.iter()
				.chain(stored)
				.find(|signal| expected.contains(signal) != stored.contains(signal))
			{
				return Err(StructuralError::InconsistentGraph {
					constraint: id,
					signal: *signal,
				});
			}
		}

		for (index, constraints) in self.constraints_of.iter().enumerate() {
			let signal = SignalId::from_index(index);
			for &constraint in constraints {
				ensure!(
					constraint.index() < self.n_constraints(),
					StructuralError::DanglingSignal {
						constraint,
						signal: index,
						n_signals: self.n_signals(),
					}
				);
				ensure!(
					self.signals_of(constraint).contains(&signal),
					StructuralError::InconsistentGraph { constraint, signal }
				);
			}
		}
		Ok(())
	}
}

/// The connected components of a dependency graph.
///
/// Every constraint mentioning a signal belongs to the component of its signals. Lists are
/// sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Components {
	component_of: Vec<usize>,
	/// Index of each signal within its component.
	position: Vec<usize>,
	signals: Vec<Vec<SignalId>>,
	constraints: Vec<Vec<ConstraintId>>,
	constant: Vec<ConstraintId>,
}

impl Components {
	pub fn len(&self) -> usize {
		self.signals.len()
	}

	pub fn is_empty(&self) -> bool {
		self.signals.is_empty()
	}

	pub fn component_of(&self, signal: SignalId) -> usize {
		self.component_of[signal.index()]
	}

	/// Index of `signal` in the signal list of its component.
	pub fn position_of(&self, signal: SignalId) -> usize {
		self.position[signal.index()]
	}

	pub fn signals(&self, component: usize) -> &[SignalId] {
		&self.signals[component]
	}

	pub fn constraints(&self, component: usize) -> &[ConstraintId] {
		&self.constraints[component]
	}

	/// Constraints mentioning no signal. Stored constraints are never zero, so any of these
	/// rules out every assignment.
	pub fn constant_constraints(&self) -> &[ConstraintId] {
		&self.constant
	}
}
