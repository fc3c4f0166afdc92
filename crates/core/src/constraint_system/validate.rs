// Copyright 2024-2025 Irreducible Inc.

use safecirc_field::Fp;
use safecirc_utils::{bail, ensure};
use tracing::instrument;

use super::{error::StructuralError, ConstraintId, ConstraintModel, ScopeId};

impl ConstraintModel {
	/// Checks the structural invariants of the model.
	///
	/// Models built through the builder methods always pass; this is meant for models obtained
	/// by deserialization or import.
	#[instrument("ConstraintModel::validate", skip_all, level = "debug")]
	pub fn validate(&self) -> Result<(), StructuralError> {
		ensure!(
			!self.scopes.is_empty() && self.scopes[0].parent.is_none(),
			StructuralError::DanglingScope {
				scope: 0,
				n_scopes: self.scopes.len(),
			}
		);

		for (index, scope) in self.scopes.iter().enumerate() {
			let Some(parent) = scope.parent else {
				continue;
			};
			self.check_scope(parent)?;

			// Walking up from any scope must reach the root within `scopes.len()` steps.
			let mut current = Some(parent);
			let mut steps = 0;
			while let Some(ancestor) = current {
				if ancestor.index() == index || steps > self.scopes.len() {
					bail!(StructuralError::CyclicScope {
						scope: ScopeId::from_index(index),
					});
				}
				current = self.scopes[ancestor.index()].parent;
				steps += 1;
			}
		}

		for signal in &self.signals {
			self.check_scope(signal.scope)?;
		}

		for (index, constraint) in self.constraints.iter().enumerate() {
			let id = ConstraintId::from_index(index);
			self.check_scope(constraint.scope)?;
			self.check_constraint(id, constraint)?;
		}
		Ok(())
	}

	/// Evaluates every constraint on a full assignment and returns the violated ones.
	///
	/// An empty result means the witness satisfies the model.
	#[instrument("ConstraintModel::validate_witness", skip_all, level = "debug")]
	pub fn validate_witness(&self, witness: &[Fp]) -> Result<Vec<ConstraintId>, StructuralError> {
		ensure!(
			witness.len() == self.signals.len(),
			StructuralError::WitnessLength {
				expected: self.signals.len(),
				got: witness.len(),
			}
		);

		let mut violated = Vec::new();
		for (id, constraint) in self.constraints() {
			let value = constraint.poly().evaluate(&self.field, |var| {
				witness
					.get(var)
					.map(|value| self.field.reduce(value.value().clone()))
			});
			match value {
				Ok(value) if value.is_zero() => {}
				Ok(_) => violated.push(id),
				Err(_) => {
					unreachable!("constraint signals are in range and the witness length is checked")
				}
			}
		}
		Ok(violated)
	}
}
