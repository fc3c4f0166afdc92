// Copyright 2024-2025 Irreducible Inc.

//! The constraint model: signals, their owning scopes and the polynomial constraints over them.

pub mod circom;
pub mod error;
mod expr;
mod graph;
#[cfg(test)]
mod tests;
mod validate;

use std::{collections::BTreeSet, fmt};

pub use error::StructuralError;
pub use expr::Expr;
pub use graph::{Components, DependencyGraph};
use safecirc_field::{Fp, PrimeField};
use safecirc_math::SparsePolynomial;
use safecirc_utils::{bail, ensure};
use serde::{Deserialize, Serialize};

macro_rules! define_id {
	($(#[$meta:meta])* $name:ident, $prefix:literal) => {
		$(#[$meta])*
		///
		/// This is essentially an index into the owning [`ConstraintModel`].
		#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(usize);

		impl $name {
			pub const fn from_index(index: usize) -> Self {
				Self(index)
			}

			pub const fn index(&self) -> usize {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, concat!($prefix, "{}"), self.0)
			}
		}
	};
}

define_id!(
	/// Identifier of a signal.
	SignalId,
	"s"
);
define_id!(
	/// Identifier of a constraint.
	ConstraintId,
	"c"
);
define_id!(
	/// Identifier of a component instance.
	ScopeId,
	"scope"
);

/// Role of a signal in its circuit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalRole {
	Input,
	Output,
	Intermediate,
	/// A public constant.
	Fixed,
}

impl SignalRole {
	/// Inputs and fixed signals are given; everything else must be determined by them.
	pub const fn is_parameter(self) -> bool {
		matches!(self, Self::Input | Self::Fixed)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
	pub name: String,
	pub role: SignalRole,
	pub scope: ScopeId,
}

/// A component instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
	/// Instance name relative to the parent, such as `c[0]`.
	pub name: String,
	pub template: String,
	pub parent: Option<ScopeId>,
}

/// A polynomial equation `poly = 0`, with variables indexed by signal index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
	poly: SparsePolynomial,
	/// The signal this constraint computes, for constraints written with `<==`.
	assigns: Option<SignalId>,
	scope: ScopeId,
}

impl Constraint {
	pub const fn poly(&self) -> &SparsePolynomial {
		&self.poly
	}

	pub const fn assigns(&self) -> Option<SignalId> {
		self.assigns
	}

	pub const fn scope(&self) -> ScopeId {
		self.scope
	}

	pub fn degree(&self) -> u32 {
		self.poly.degree()
	}

	/// The signals occurring in the constraint, in increasing order.
	pub fn variables(&self) -> impl Iterator<Item = SignalId> {
		self.poly
			.variables()
			.into_iter()
			.map(SignalId::from_index)
	}

	pub fn contains(&self, signal: SignalId) -> bool {
		self.poly.contains_variable(signal.index())
	}
}

/// A flattened circuit over a prime field.
///
/// The model is built incrementally and is read-only once verification starts. Every mutation
/// is validated, so a model obtained through the builder methods is structurally sound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ModelData", into = "ModelData")]
pub struct ConstraintModel {
	field: PrimeField,
	scopes: Vec<Scope>,
	signals: Vec<Signal>,
	constraints: Vec<Constraint>,
}

impl Default for ConstraintModel {
	fn default() -> Self {
		Self::new(PrimeField::bn254())
	}
}

impl ConstraintModel {
	/// Creates an empty model with a root scope named `main`.
	pub fn new(field: PrimeField) -> Self {
		Self {
			field,
			scopes: vec![Scope {
				name: "main".into(),
				template: "main".into(),
				parent: None,
			}],
			signals: Vec::new(),
			constraints: Vec::new(),
		}
	}

	pub const fn field(&self) -> &PrimeField {
		&self.field
	}

	pub const fn root_scope(&self) -> ScopeId {
		ScopeId(0)
	}

	pub fn n_signals(&self) -> usize {
		self.signals.len()
	}

	pub fn n_constraints(&self) -> usize {
		self.constraints.len()
	}

	pub fn n_scopes(&self) -> usize {
		self.scopes.len()
	}

	pub fn signal(&self, id: SignalId) -> &Signal {
		&self.signals[id.0]
	}

	pub fn constraint(&self, id: ConstraintId) -> &Constraint {
		&self.constraints[id.0]
	}

	pub fn scope(&self, id: ScopeId) -> &Scope {
		&self.scopes[id.0]
	}

	pub fn signals(&self) -> impl Iterator<Item = (SignalId, &Signal)> {
		self.signals
			.iter()
			.enumerate()
			.map(|(i, signal)| (SignalId(i), signal))
	}

	pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
		self.constraints
			.iter()
			.enumerate()
			.map(|(i, constraint)| (ConstraintId(i), constraint))
	}

	pub fn is_valid_signal(&self, id: SignalId) -> bool {
		id.0 < self.signals.len()
	}

	/// Dotted path of a scope from the root, such as `main.c[0]`.
	pub fn scope_path(&self, id: ScopeId) -> String {
		let mut names = Vec::new();
		let mut current = Some(id);
		while let Some(scope) = current {
			let scope = &self.scopes[scope.0];
			names.push(scope.name.as_str());
			current = scope.parent;
			if names.len() > self.scopes.len() {
				break;
			}
		}
		names.reverse();
		names.join(".")
	}

	/// Fully qualified name of a signal, such as `main.c[0].out`.
	pub fn qualified_name(&self, id: SignalId) -> String {
		let signal = self.signal(id);
		format!("{}.{}", self.scope_path(signal.scope), signal.name)
	}

	/// Looks a signal up by its qualified name.
	pub fn find_signal(&self, qualified_name: &str) -> Option<SignalId> {
		(0..self.signals.len())
			.map(SignalId)
			.find(|&id| self.qualified_name(id) == qualified_name)
	}

	pub fn add_scope(
		&mut self,
		name: impl ToString,
		template: impl ToString,
		parent: ScopeId,
	) -> Result<ScopeId, StructuralError> {
		self.check_scope(parent)?;
		let id = ScopeId(self.scopes.len());
		self.scopes.push(Scope {
			name: name.to_string(),
			template: template.to_string(),
			parent: Some(parent),
		});
		Ok(id)
	}

	pub fn add_signal(
		&mut self,
		name: impl ToString,
		role: SignalRole,
		scope: ScopeId,
	) -> Result<SignalId, StructuralError> {
		self.check_scope(scope)?;
		let id = SignalId(self.signals.len());
		self.signals.push(Signal {
			name: name.to_string(),
			role,
			scope,
		});
		Ok(id)
	}

	fn add_root_signal(&mut self, name: impl ToString, role: SignalRole) -> SignalId {
		let id = SignalId(self.signals.len());
		self.signals.push(Signal {
			name: name.to_string(),
			role,
			scope: self.root_scope(),
		});
		id
	}

	pub fn add_input(&mut self, name: impl ToString) -> SignalId {
		self.add_root_signal(name, SignalRole::Input)
	}

	pub fn add_output(&mut self, name: impl ToString) -> SignalId {
		self.add_root_signal(name, SignalRole::Output)
	}

	pub fn add_intermediate(&mut self, name: impl ToString) -> SignalId {
		self.add_root_signal(name, SignalRole::Intermediate)
	}

	pub fn add_fixed(&mut self, name: impl ToString) -> SignalId {
		self.add_root_signal(name, SignalRole::Fixed)
	}

	/// Adds `expr === 0` in the root scope.
	///
	/// Returns `None` if the expression is identically zero, in which case nothing is added.
	pub fn constrain(
		&mut self,
		expr: impl Into<Expr>,
	) -> Result<Option<ConstraintId>, StructuralError> {
		let poly = expr.into().to_polynomial(&self.field);
		self.add_constraint(poly, None, self.root_scope())
	}

	/// Adds `target <== expr` in the root scope, that is the constraint `target - expr = 0`
	/// oriented towards `target`.
	pub fn assign(
		&mut self,
		target: SignalId,
		expr: impl Into<Expr>,
	) -> Result<Option<ConstraintId>, StructuralError> {
		let poly = (Expr::from(target) - expr.into()).to_polynomial(&self.field);
		self.add_constraint(poly, Some(target), self.root_scope())
	}

	/// Adds the rank-one constraint `a * b - c = 0`, where the factors must be linear.
	pub fn add_r1cs(
		&mut self,
		a: impl Into<Expr>,
		b: impl Into<Expr>,
		c: impl Into<Expr>,
		assigns: Option<SignalId>,
		scope: ScopeId,
	) -> Result<Option<ConstraintId>, StructuralError> {
		let mut factors = Vec::with_capacity(3);
		for (name, factor) in [('A', a.into()), ('B', b.into()), ('C', c.into())] {
			let poly = factor.to_polynomial(&self.field);
			ensure!(poly.is_linear(), StructuralError::NonLinearFactor { factor: name });
			factors.push(poly);
		}
		let poly = factors[0]
			.mul(&factors[1], &self.field)
			.sub(&factors[2], &self.field);
		self.add_constraint(poly, assigns, scope)
	}

	/// Adds a constraint given as a polynomial over signal indices.
	///
	/// Returns `None` if the polynomial is zero, in which case nothing is added.
	///
	/// ## Throws
	///
	/// * [`StructuralError::DanglingSignal`] if the polynomial mentions an unknown signal
	/// * [`StructuralError::NonCanonicalCoefficient`] if a coefficient is not reduced
	/// * [`StructuralError::AssignedSignalAbsent`] or [`StructuralError::AssignedParameter`] if
	///   `assigns` is not a non-parameter signal of the constraint
	pub fn add_constraint(
		&mut self,
		poly: SparsePolynomial,
		assigns: Option<SignalId>,
		scope: ScopeId,
	) -> Result<Option<ConstraintId>, StructuralError> {
		self.check_scope(scope)?;
		if poly.is_zero() {
			return Ok(None);
		}
		let id = ConstraintId(self.constraints.len());
		let constraint = Constraint {
			poly,
			assigns,
			scope,
		};
		self.check_constraint(id, &constraint)?;
		self.constraints.push(constraint);
		Ok(Some(id))
	}

	fn check_scope(&self, scope: ScopeId) -> Result<(), StructuralError> {
		ensure!(
			scope.0 < self.scopes.len(),
			StructuralError::DanglingScope {
				scope: scope.0,
				n_scopes: self.scopes.len(),
			}
		);
		Ok(())
	}

	fn check_constraint(
		&self,
		id: ConstraintId,
		constraint: &Constraint,
	) -> Result<(), StructuralError> {
		for (monomial, coeff) in constraint.poly.terms() {
			ensure!(self.field.contains(coeff), StructuralError::NonCanonicalCoefficient { constraint: id });
			for var in monomial.variables() {
				ensure!(
					var < self.signals.len(),
					StructuralError::DanglingSignal {
						constraint: id,
						signal: var,
						n_signals: self.signals.len(),
					}
				);
			}
		}
		if let Some(signal) = constraint.assigns {
			if !constraint.contains(signal) {
				bail!(StructuralError::AssignedSignalAbsent {
					constraint: id,
					signal,
				});
			}
			ensure!(
				!self.signal(signal).role.is_parameter(),
				StructuralError::AssignedParameter { signal }
			);
		}
		Ok(())
	}

	/// The signals mentioned by at least one constraint.
	pub fn constrained_signals(&self) -> BTreeSet<SignalId> {
		self.constraints
			.iter()
			.flat_map(Constraint::variables)
			.collect()
	}
}

/// Serialized form of a [`ConstraintModel`], with the prime written in decimal.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelData {
	prime: String,
	scopes: Vec<Scope>,
	signals: Vec<Signal>,
	constraints: Vec<Constraint>,
}

impl From<ConstraintModel> for ModelData {
	fn from(model: ConstraintModel) -> Self {
		Self {
			prime: model.field.modulus().to_str_radix(10),
			scopes: model.scopes,
			signals: model.signals,
			constraints: model.constraints,
		}
	}
}

impl TryFrom<ModelData> for ConstraintModel {
	type Error = StructuralError;

	fn try_from(data: ModelData) -> Result<Self, Self::Error> {
		let field = PrimeField::from_decimal(&data.prime)?;
		let model = Self {
			field,
			scopes: data.scopes,
			signals: data.signals,
			constraints: data.constraints,
		};
		model.validate()?;
		Ok(model)
	}
}

/// A full assignment of values to the signals of a model, indexed by signal index.
pub type Assignment = Vec<Fp>;
