// Copyright 2024-2025 Irreducible Inc.

//! Sound syntactic rules resolving tasks without Gröbner basis computations.
//!
//! Every rule either proves the target determined, produces a validated witness pair, or
//! declines. Declining is always allowed; a wrong answer never is.

use std::fmt;

use safecirc_field::{Fp, PrimeField};
use safecirc_math::{Matrix, SparseMonomial, SparsePolynomial};
use tracing::trace;

use crate::{
	task::LocalSystem,
	verdict::{HeuristicRule, LocalVerdict, LocalWitnessPair, SafeEvidence, Verdict},
};

/// A set of enabled heuristic rules.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleSet(u8);

impl RuleSet {
	const fn bit(rule: HeuristicRule) -> u8 {
		1 << rule as u8
	}

	pub const fn all() -> Self {
		let mut mask = 0;
		let mut i = 0;
		while i < HeuristicRule::ALL.len() {
			mask |= Self::bit(HeuristicRule::ALL[i]);
			i += 1;
		}
		Self(mask)
	}

	pub const fn none() -> Self {
		Self(0)
	}

	pub const fn with(self, rule: HeuristicRule) -> Self {
		Self(self.0 | Self::bit(rule))
	}

	pub const fn without(self, rule: HeuristicRule) -> Self {
		Self(self.0 & !Self::bit(rule))
	}

	pub const fn contains(self, rule: HeuristicRule) -> bool {
		self.0 & Self::bit(rule) != 0
	}

	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// Enabled rules in priority order.
	pub fn iter(self) -> impl Iterator<Item = HeuristicRule> {
		HeuristicRule::ALL
			.into_iter()
			.filter(move |&rule| self.contains(rule))
	}
}

impl Default for RuleSet {
	fn default() -> Self {
		Self::all()
	}
}

impl fmt::Debug for RuleSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.iter()).finish()
	}
}

impl FromIterator<HeuristicRule> for RuleSet {
	fn from_iter<I: IntoIterator<Item = HeuristicRule>>(iter: I) -> Self {
		iter.into_iter().fold(Self::none(), Self::with)
	}
}

/// Tries the enabled rules in priority order and returns the first one that decides the task.
pub fn check(
	local: &LocalSystem,
	field: &PrimeField,
	rules: RuleSet,
) -> Option<(HeuristicRule, LocalVerdict)> {
	rules.iter().find_map(|rule| {
		let verdict = rule.evaluate(local, field)?;
		trace!(%rule, safe = verdict.is_safe(), "heuristic rule fired");
		Some((rule, verdict))
	})
}

impl HeuristicRule {
	/// Applies this rule alone. `None` means the rule does not apply.
	pub fn evaluate(self, local: &LocalSystem, field: &PrimeField) -> Option<LocalVerdict> {
		match self {
			Self::FreeSignal => free_signal(local),
			Self::LinearSystem => linear_system(local, field),
			Self::DirectAssignment => direct_assignment(local),
			Self::BooleanDecomposition => boolean_decomposition(local, field),
		}
	}
}

fn safe(rule: HeuristicRule) -> Option<LocalVerdict> {
	Some(Verdict::Safe(SafeEvidence::Heuristic(rule)))
}

fn free_signal(local: &LocalSystem) -> Option<LocalVerdict> {
	if !local.constraints().is_empty() {
		return None;
	}
	debug_assert_eq!(local.n_signals(), 1);
	Some(Verdict::Unsafe(LocalWitnessPair {
		first: vec![Fp::zero()],
		second: vec![Fp::one()],
	}))
}

fn linear_system(local: &LocalSystem, field: &PrimeField) -> Option<LocalVerdict> {
	let constraints = local.constraints();
	if constraints.is_empty() || !constraints.iter().all(SparsePolynomial::is_linear) {
		return None;
	}

	// Columns: the unknowns (target first), then the constant term. Parameters are set to zero
	// when building a counter-example and do not affect whether the target is a pivot.
	let unknowns = local.unknowns().collect::<Vec<_>>();
	let k = unknowns.len();
	let mut column_of = vec![None; local.n_signals()];
	for (column, &label) in unknowns.iter().enumerate() {
		column_of[label] = Some(column);
	}

	let mut matrix = Matrix::zeros(constraints.len(), k + 1);
	for (row, poly) in constraints.iter().enumerate() {
		for (monomial, coeff) in poly.terms() {
			match monomial.as_variable() {
				Some(var) => {
					if let Some(column) = column_of[var] {
						matrix[(row, column)] = coeff.clone();
					}
				}
				None => matrix[(row, k)] = coeff.clone(),
			}
		}
	}
	let pivots = matrix.row_reduce(field, k);

	let pivot_row_of = |column: usize| pivots.iter().position(|&pivot| pivot == column);
	let is_free = |column: usize| pivot_row_of(column).is_none();
	let target_row = pivot_row_of(0);
	if let Some(row) = target_row {
		if (1..k).all(|column| !is_free(column) || matrix[(row, column)].is_zero()) {
			return safe(HeuristicRule::LinearSystem);
		}
	}

	// The target is not determined. With every parameter at zero, the system must be
	// consistent for the counter-example to exist.
	if (pivots.len()..constraints.len()).any(|row| !matrix[(row, k)].is_zero()) {
		return None;
	}
	let varied = match target_row {
		None => 0,
		Some(row) => (1..k).find(|&column| is_free(column) && !matrix[(row, column)].is_zero())?,
	};

	let solve = |free_value: Fp| {
		let mut columns = vec![Fp::zero(); k];
		columns[varied] = free_value;
		for (row, &pivot) in pivots.iter().enumerate() {
			let mut value = field.neg(&matrix[(row, k)]);
			for column in (0..k).filter(|&column| is_free(column)) {
				value = field.sub(&value, &field.mul(&matrix[(row, column)], &columns[column]));
			}
			columns[pivot] = value;
		}
		let mut values = vec![Fp::zero(); local.n_signals()];
		for (column, &label) in unknowns.iter().enumerate() {
			values[label] = columns[column].clone();
		}
		values
	};
	let pair = LocalWitnessPair {
		first: solve(Fp::zero()),
		second: solve(Fp::one()),
	};
	local
		.check_witness_pair(field, &pair)
		.then_some(Verdict::Unsafe(pair))
}

/// Whether `var` occurs in `poly` only through a degree-one term with a non-zero coefficient.
fn is_linear_in(poly: &SparsePolynomial, var: usize) -> bool {
	let single = SparseMonomial::var(var);
	let mut found = false;
	for (monomial, _) in poly.terms() {
		if *monomial == single {
			found = true;
		} else if monomial.exponent(var) > 0 {
			return false;
		}
	}
	found
}

fn direct_assignment(local: &LocalSystem) -> Option<LocalVerdict> {
	let target = LocalSystem::TARGET;
	local
		.constraints()
		.iter()
		.any(|poly| {
			is_linear_in(poly, target)
				&& poly
					.variables()
					.into_iter()
					.all(|var| var == target || local.is_parameter(var))
		})
		.then_some(Verdict::Safe(SafeEvidence::Heuristic(HeuristicRule::DirectAssignment)))
}

/// Whether `poly` is `a * (x^2 - x)` for some non-zero `a`.
fn is_boolean_constraint(poly: &SparsePolynomial, var: usize, field: &PrimeField) -> bool {
	if poly.len() != 2 {
		return false;
	}
	let square = SparseMonomial::from(vec![(var, 2)]);
	let Some(a) = poly
		.terms()
		.find(|(monomial, _)| **monomial == square)
		.map(|(_, coeff)| coeff)
	else {
		return false;
	};
	poly.linear_coefficient(var) == field.neg(a)
}

fn is_boolean(local: &LocalSystem, var: usize, field: &PrimeField) -> bool {
	local
		.constraints()
		.iter()
		.any(|poly| is_boolean_constraint(poly, var, field))
}

/// Exponents `e_i` such that `coeffs[i] = k * 2^e_i` for a common `k`, if they exist, are
/// distinct and leave the weighted sum of bits below the modulus.
fn binary_weights(coeffs: &[Fp], field: &PrimeField) -> Option<Vec<u64>> {
	coeffs.iter().find_map(|base| {
		let exponents = coeffs
			.iter()
			.map(|coeff| {
				let ratio = field.div(coeff, base).ok()?;
				let value = ratio.value();
				(value.count_ones() == 1)
					.then(|| value.trailing_zeros())
					.flatten()
			})
			.collect::<Option<Vec<_>>>()?;

		let mut sorted = exponents.clone();
		sorted.sort_unstable();
		sorted.dedup();
		let max = *sorted.last()?;
		(sorted.len() == exponents.len() && max + 2 <= field.bits()).then_some(exponents)
	})
}

fn boolean_decomposition(local: &LocalSystem, field: &PrimeField) -> Option<LocalVerdict> {
	let target = LocalSystem::TARGET;
	if !is_boolean(local, target, field) {
		return None;
	}

	let disambiguated = local.constraints().iter().any(|poly| {
		if !poly.is_linear() || poly.linear_coefficient(target).is_zero() {
			return false;
		}
		let bits = poly
			.variables()
			.into_iter()
			.filter(|&var| !local.is_parameter(var))
			.collect::<Vec<_>>();
		if !bits.iter().all(|&var| is_boolean(local, var, field)) {
			return false;
		}
		let coeffs = bits
			.iter()
			.map(|&var| poly.linear_coefficient(var))
			.collect::<Vec<_>>();
		binary_weights(&coeffs, field).is_some()
	});
	if disambiguated {
		safe(HeuristicRule::BooleanDecomposition)
	} else {
		None
	}
}
