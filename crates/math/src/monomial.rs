// Copyright 2025 Irreducible Inc.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

/// A power product `x_0^{e_0} * ... * x_{n-1}^{e_{n-1}}` over a fixed number of variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Monomial {
	exponents: Vec<u32>,
}

impl Monomial {
	pub fn new(exponents: Vec<u32>) -> Self {
		Self { exponents }
	}

	/// The constant monomial `1`.
	pub fn one(n_vars: usize) -> Self {
		Self {
			exponents: vec![0; n_vars],
		}
	}

	/// The monomial `x_var^exp`.
	///
	/// ## Preconditions
	///
	/// * `var < n_vars`
	pub fn var(n_vars: usize, var: usize, exp: u32) -> Self {
		let mut exponents = vec![0; n_vars];
		exponents[var] = exp;
		Self { exponents }
	}

	pub fn n_vars(&self) -> usize {
		self.exponents.len()
	}

	pub fn exponents(&self) -> &[u32] {
		&self.exponents
	}

	pub fn exponent(&self, var: usize) -> u32 {
		self.exponents[var]
	}

	/// The total degree.
	pub fn degree(&self) -> u32 {
		self.exponents.iter().sum()
	}

	pub fn is_one(&self) -> bool {
		self.exponents.iter().all(|&e| e == 0)
	}

	/// Indices of the variables with a positive exponent.
	pub fn support(&self) -> impl Iterator<Item = usize> + '_ {
		self.exponents
			.iter()
			.enumerate()
			.filter(|(_, &e)| e > 0)
			.map(|(i, _)| i)
	}

	/// Whether `self` divides `other`.
	pub fn divides(&self, other: &Self) -> bool {
		debug_assert_eq!(self.n_vars(), other.n_vars());
		self.exponents
			.iter()
			.zip(&other.exponents)
			.all(|(a, b)| a <= b)
	}

	/// Whether `self` and `other` share no variable.
	pub fn is_coprime(&self, other: &Self) -> bool {
		self.exponents
			.iter()
			.zip(&other.exponents)
			.all(|(&a, &b)| a == 0 || b == 0)
	}

	pub fn mul(&self, other: &Self) -> Self {
		debug_assert_eq!(self.n_vars(), other.n_vars());
		Self {
			exponents: self
				.exponents
				.iter()
				.zip(&other.exponents)
				.map(|(a, b)| a + b)
				.collect(),
		}
	}

	/// Returns `self / other` if `other` divides `self`.
	pub fn checked_div(&self, other: &Self) -> Option<Self> {
		debug_assert_eq!(self.n_vars(), other.n_vars());
		let exponents = self
			.exponents
			.iter()
			.zip(&other.exponents)
			.map(|(&a, &b)| a.checked_sub(b))
			.collect::<Option<Vec<_>>>()?;
		Some(Self { exponents })
	}

	pub fn lcm(&self, other: &Self) -> Self {
		debug_assert_eq!(self.n_vars(), other.n_vars());
		Self {
			exponents: self
				.exponents
				.iter()
				.zip(&other.exponents)
				.map(|(&a, &b)| a.max(b))
				.collect(),
		}
	}
}

impl fmt::Display for Monomial {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_one() {
			return write!(f, "1");
		}
		let mut first = true;
		for (var, &exp) in self.exponents.iter().enumerate() {
			if exp == 0 {
				continue;
			}
			if !first {
				write!(f, "*")?;
			}
			first = false;
			match exp {
				1 => write!(f, "x{var}")?,
				_ => write!(f, "x{var}^{exp}")?,
			}
		}
		Ok(())
	}
}

/// An admissible monomial order. Variable `x_0` is the largest variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TermOrder {
	/// Pure lexicographic order, an elimination order for every prefix of the variables.
	Lex,
	/// Graded reverse lexicographic order, usually the cheapest order for membership tests.
	#[default]
	GrevLex,
}

impl TermOrder {
	pub fn cmp(&self, a: &Monomial, b: &Monomial) -> Ordering {
		debug_assert_eq!(a.n_vars(), b.n_vars());
		match self {
			Self::Lex => a.exponents.cmp(&b.exponents),
			Self::GrevLex => a.degree().cmp(&b.degree()).then_with(|| {
				a.exponents
					.iter()
					.zip(&b.exponents)
					.rev()
					.find(|(x, y)| x != y)
					.map_or(Ordering::Equal, |(x, y)| y.cmp(x))
			}),
		}
	}
}
