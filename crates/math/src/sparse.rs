// Copyright 2025 Irreducible Inc.

//! Sparse polynomials over arbitrary variable identifiers, used to state constraints before the
//! variables of a particular computation are fixed.

use std::{
	collections::{BTreeMap, BTreeSet},
	fmt,
};

use safecirc_field::{Fp, PrimeField};
use serde::{Deserialize, Serialize};

use crate::{
	error::Error,
	monomial::Monomial,
	polynomial::{PolyRing, Polynomial},
};

/// A power product stored as `(variable, exponent)` pairs sorted by variable, with positive
/// exponents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Vec<(usize, u32)>", into = "Vec<(usize, u32)>")]
pub struct SparseMonomial(Vec<(usize, u32)>);

impl SparseMonomial {
	pub fn one() -> Self {
		Self::default()
	}

	pub fn var(var: usize) -> Self {
		Self(vec![(var, 1)])
	}

	pub fn is_one(&self) -> bool {
		self.0.is_empty()
	}

	pub fn degree(&self) -> u32 {
		self.0.iter().map(|&(_, exp)| exp).sum()
	}

	pub fn exponent(&self, var: usize) -> u32 {
		self.0
			.binary_search_by_key(&var, |&(v, _)| v)
			.map_or(0, |index| self.0[index].1)
	}

	pub fn factors(&self) -> &[(usize, u32)] {
		&self.0
	}

	pub fn variables(&self) -> impl Iterator<Item = usize> + '_ {
		self.0.iter().map(|&(var, _)| var)
	}

	/// If the monomial is a single variable to the first power, returns it.
	pub fn as_variable(&self) -> Option<usize> {
		match self.0.as_slice() {
			[(var, 1)] => Some(*var),
			_ => None,
		}
	}

	pub fn mul(&self, other: &Self) -> Self {
		let mut exps = BTreeMap::new();
		for &(var, exp) in self.0.iter().chain(&other.0) {
			*exps.entry(var).or_insert(0) += exp;
		}
		Self(exps.into_iter().collect())
	}
}

impl From<Vec<(usize, u32)>> for SparseMonomial {
	fn from(factors: Vec<(usize, u32)>) -> Self {
		let mut exps = BTreeMap::new();
		for (var, exp) in factors {
			*exps.entry(var).or_insert(0) += exp;
		}
		Self(exps.into_iter().filter(|&(_, exp)| exp > 0).collect())
	}
}

impl From<SparseMonomial> for Vec<(usize, u32)> {
	fn from(monomial: SparseMonomial) -> Self {
		monomial.0
	}
}

/// A polynomial with sparse monomials, keyed by monomial. Coefficients are non-zero.
///
/// Serialized as a list of `(monomial, coefficient)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<(SparseMonomial, Fp)>", into = "Vec<(SparseMonomial, Fp)>")]
pub struct SparsePolynomial {
	terms: BTreeMap<SparseMonomial, Fp>,
}

impl From<Vec<(SparseMonomial, Fp)>> for SparsePolynomial {
	fn from(terms: Vec<(SparseMonomial, Fp)>) -> Self {
		Self {
			terms: terms.into_iter().filter(|(_, c)| !c.is_zero()).collect(),
		}
	}
}

impl From<SparsePolynomial> for Vec<(SparseMonomial, Fp)> {
	fn from(poly: SparsePolynomial) -> Self {
		poly.terms.into_iter().collect()
	}
}

impl SparsePolynomial {
	pub fn zero() -> Self {
		Self::default()
	}

	pub fn constant(c: Fp) -> Self {
		Self::monomial(c, SparseMonomial::one())
	}

	pub fn var(var: usize) -> Self {
		Self::monomial(Fp::one(), SparseMonomial::var(var))
	}

	pub fn monomial(coeff: Fp, monomial: SparseMonomial) -> Self {
		let mut terms = BTreeMap::new();
		if !coeff.is_zero() {
			terms.insert(monomial, coeff);
		}
		Self { terms }
	}

	/// Builds a polynomial from terms, reducing coefficients and combining repeated monomials.
	pub fn from_terms(
		field: &PrimeField,
		terms: impl IntoIterator<Item = (SparseMonomial, Fp)>,
	) -> Self {
		let mut out = Self::zero();
		for (monomial, coeff) in terms {
			out.add_term(field, monomial, &field.reduce(coeff.into_value()));
		}
		out
	}

	fn add_term(&mut self, field: &PrimeField, monomial: SparseMonomial, coeff: &Fp) {
		let sum = match self.terms.get(&monomial) {
			Some(existing) => field.add(existing, coeff),
			None => coeff.clone(),
		};
		if sum.is_zero() {
			self.terms.remove(&monomial);
		} else {
			self.terms.insert(monomial, sum);
		}
	}

	pub fn is_zero(&self) -> bool {
		self.terms.is_empty()
	}

	pub fn len(&self) -> usize {
		self.terms.len()
	}

	pub fn is_empty(&self) -> bool {
		self.terms.is_empty()
	}

	pub fn terms(&self) -> impl Iterator<Item = (&SparseMonomial, &Fp)> {
		self.terms.iter()
	}

	pub fn degree(&self) -> u32 {
		self.terms.keys().map(SparseMonomial::degree).max().unwrap_or(0)
	}

	/// Whether every term has degree at most one.
	pub fn is_linear(&self) -> bool {
		self.degree() <= 1
	}

	/// Largest exponent of `var` over all terms.
	pub fn degree_in(&self, var: usize) -> u32 {
		self.terms
			.keys()
			.map(|m| m.exponent(var))
			.max()
			.unwrap_or(0)
	}

	pub fn variables(&self) -> BTreeSet<usize> {
		self.terms.keys().flat_map(SparseMonomial::variables).collect()
	}

	pub fn contains_variable(&self, var: usize) -> bool {
		self.terms.keys().any(|m| m.exponent(var) > 0)
	}

	pub fn constant_term(&self) -> Fp {
		self.terms
			.get(&SparseMonomial::one())
			.cloned()
			.unwrap_or_default()
	}

	/// The coefficient of the degree-one monomial `var`.
	pub fn linear_coefficient(&self, var: usize) -> Fp {
		self.terms
			.get(&SparseMonomial::var(var))
			.cloned()
			.unwrap_or_default()
	}

	pub fn add(&self, other: &Self, field: &PrimeField) -> Self {
		let mut out = self.clone();
		for (monomial, coeff) in &other.terms {
			out.add_term(field, monomial.clone(), coeff);
		}
		out
	}

	pub fn sub(&self, other: &Self, field: &PrimeField) -> Self {
		self.add(&other.neg(field), field)
	}

	pub fn neg(&self, field: &PrimeField) -> Self {
		Self {
			terms: self
				.terms
				.iter()
				.map(|(m, c)| (m.clone(), field.neg(c)))
				.collect(),
		}
	}

	pub fn scale(&self, scalar: &Fp, field: &PrimeField) -> Self {
		if scalar.is_zero() {
			return Self::zero();
		}
		Self {
			terms: self
				.terms
				.iter()
				.map(|(m, c)| (m.clone(), field.mul(c, scalar)))
				.collect(),
		}
	}

	pub fn mul(&self, other: &Self, field: &PrimeField) -> Self {
		let mut out = Self::zero();
		for (ma, ca) in &self.terms {
			for (mb, cb) in &other.terms {
				out.add_term(field, ma.mul(mb), &field.mul(ca, cb));
			}
		}
		out
	}

	pub fn pow(&self, exp: u32, field: &PrimeField) -> Self {
		let mut result = Self::constant(Fp::one());
		let mut base = self.clone();
		let mut exp = exp;
		while exp > 0 {
			if exp & 1 == 1 {
				result = result.mul(&base, field);
			}
			exp >>= 1;
			if exp > 0 {
				base = base.mul(&base, field);
			}
		}
		result
	}

	/// Evaluates the polynomial given a value for each of its variables.
	///
	/// ## Throws
	///
	/// * [`Error::UnassignedVariable`] if `value_of` has no value for a variable
	pub fn evaluate(
		&self,
		field: &PrimeField,
		mut value_of: impl FnMut(usize) -> Option<Fp>,
	) -> Result<Fp, Error> {
		let mut acc = Fp::zero();
		for (monomial, coeff) in &self.terms {
			let mut term = coeff.clone();
			for &(var, exp) in monomial.factors() {
				let value = value_of(var).ok_or(Error::UnassignedVariable { var })?;
				term = field.mul(&term, &field.pow_u64(&value, exp as u64));
			}
			acc = field.add(&acc, &term);
		}
		Ok(acc)
	}

	/// Renames the variables. Terms that collide after renaming are combined.
	pub fn map_variables(&self, field: &PrimeField, mut rename: impl FnMut(usize) -> usize) -> Self {
		let mut out = Self::zero();
		for (monomial, coeff) in &self.terms {
			let renamed = SparseMonomial::from(
				monomial
					.factors()
					.iter()
					.map(|&(var, exp)| (rename(var), exp))
					.collect::<Vec<_>>(),
			);
			out.add_term(field, renamed, coeff);
		}
		out
	}

	/// Converts to a dense polynomial of `ring`, mapping each variable to a ring variable.
	///
	/// ## Throws
	///
	/// * [`Error::VariableOutOfRange`] if a variable is unmapped or maps outside the ring
	pub fn to_dense(
		&self,
		ring: &PolyRing,
		mut ring_var: impl FnMut(usize) -> Option<usize>,
	) -> Result<Polynomial, Error> {
		let n_vars = ring.n_vars();
		let mut terms = Vec::with_capacity(self.terms.len());
		for (monomial, coeff) in &self.terms {
			let mut exponents = vec![0; n_vars];
			for &(var, exp) in monomial.factors() {
				let index = ring_var(var)
					.filter(|&index| index < n_vars)
					.ok_or(Error::VariableOutOfRange { var, n_vars })?;
				exponents[index] += exp;
			}
			terms.push((coeff.clone(), Monomial::new(exponents)));
		}
		Ok(ring.from_terms(terms))
	}

	/// A printable view using `name` to render variables.
	pub fn display<'a, N: Fn(usize) -> String + 'a>(
		&'a self,
		field: &'a PrimeField,
		name: N,
	) -> impl fmt::Display + 'a {
		SparseDisplay {
			poly: self,
			field,
			name,
		}
	}
}

struct SparseDisplay<'a, N> {
	poly: &'a SparsePolynomial,
	field: &'a PrimeField,
	name: N,
}

impl<N: Fn(usize) -> String> fmt::Display for SparseDisplay<'_, N> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.poly.is_zero() {
			return write!(f, "0");
		}
		// Highest degree first.
		let mut terms = self.poly.terms.iter().collect::<Vec<_>>();
		terms.sort_by_key(|(m, _)| std::cmp::Reverse(m.degree()));
		for (i, (monomial, coeff)) in terms.into_iter().enumerate() {
			let signed = self.field.signed(coeff);
			let negative = signed.sign() == num_bigint::Sign::Minus;
			let magnitude = signed.magnitude();
			match (i, negative) {
				(0, true) => write!(f, "-")?,
				(0, false) => {}
				(_, true) => write!(f, " - ")?,
				(_, false) => write!(f, " + ")?,
			}
			let factors = monomial
				.factors()
				.iter()
				.map(|&(var, exp)| match exp {
					1 => (self.name)(var),
					_ => format!("{}^{exp}", (self.name)(var)),
				})
				.collect::<Vec<_>>()
				.join("*");
			match (num_traits::One::is_one(magnitude), monomial.is_one()) {
				(_, true) => write!(f, "{magnitude}")?,
				(true, false) => write!(f, "{factors}")?,
				(false, false) => write!(f, "{magnitude}*{factors}")?,
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use num_bigint::BigUint;

	use super::*;
	use crate::monomial::TermOrder;

	fn field() -> PrimeField {
		PrimeField::new(BigUint::from(101u32)).unwrap()
	}

	#[test]
	fn test_arithmetic_and_queries() {
		let field = field();
		let x = SparsePolynomial::var(3);
		let y = SparsePolynomial::var(7);
		// x * (x - 1) + 2y
		let x_minus_one = x.sub(&SparsePolynomial::constant(Fp::one()), &field);
		let p = x
			.mul(&x_minus_one, &field)
			.add(&y.scale(&field.from_u64(2), &field), &field);

		assert_eq!(p.degree(), 2);
		assert_eq!(p.degree_in(3), 2);
		assert!(!p.is_linear());
		assert_eq!(p.variables(), BTreeSet::from([3, 7]));
		assert_eq!(p.linear_coefficient(3), field.from_i64(-1));
		assert_eq!(p.linear_coefficient(7), field.from_u64(2));
		assert!(p.constant_term().is_zero());
		assert!(p.sub(&p, &field).is_zero());
		assert_eq!(p.display(&field, |v| format!("s{v}")).to_string(), "s3^2 - s3 + 2*s7");
	}

	#[test]
	fn test_pow_matches_repeated_mul() {
		let field = field();
		let p = SparsePolynomial::var(0).add(&SparsePolynomial::var(1), &field);
		let cube = p.mul(&p, &field).mul(&p, &field);
		assert_eq!(p.pow(3, &field), cube);
		assert_eq!(p.pow(0, &field), SparsePolynomial::constant(Fp::one()));
	}

	#[test]
	fn test_evaluate() {
		let field = field();
		// 5 * a^2 * b - 1
		let p = SparsePolynomial::from_terms(
			&field,
			[
				(SparseMonomial::from(vec![(10, 2), (20, 1)]), field.from_u64(5)),
				(SparseMonomial::one(), field.from_i64(-1)),
			],
		);
		let value = |var| match var {
			10 => Some(field.from_u64(2)),
			20 => Some(field.from_u64(3)),
			_ => None,
		};
		assert_eq!(p.evaluate(&field, value).unwrap(), field.from_u64(59));
		assert!(p.evaluate(&field, |_| None).is_err());
	}

	#[test]
	fn test_map_variables_combines() {
		let field = field();
		let p = SparsePolynomial::var(0).sub(&SparsePolynomial::var(1), &field);
		assert!(p.map_variables(&field, |_| 5).is_zero());
	}

	#[test]
	fn test_to_dense() {
		let field = field();
		let ring = PolyRing::new(field.clone(), 2, TermOrder::GrevLex);
		let p = SparsePolynomial::var(42)
			.mul(&SparsePolynomial::var(7), &field)
			.add(&SparsePolynomial::constant(field.from_u64(3)), &field);
		let dense = p
			.to_dense(&ring, |var| match var {
				42 => Some(0),
				7 => Some(1),
				_ => None,
			})
			.unwrap();
		assert_eq!(dense.leading_monomial(), Some(&Monomial::new(vec![1, 1])));
		assert!(p.to_dense(&ring, |_| None).is_err());
	}

	#[test]
	fn test_serde_as_term_list() {
		let field = field();
		let p = SparsePolynomial::var(2).add(&SparsePolynomial::constant(field.from_u64(7)), &field);
		let json = serde_json::to_string(&p).unwrap();
		assert_eq!(json, r#"[[[],"7"],[[[2,1]],"1"]]"#);
		let back: SparsePolynomial = serde_json::from_str(&json).unwrap();
		assert_eq!(back, p);
	}
}
