// Copyright 2024-2025 Irreducible Inc.

use std::{
	fmt::{self, Display},
	ops::{Add, Mul, Neg, Sub},
};

use num_bigint::BigInt;
use safecirc_field::PrimeField;
use safecirc_math::SparsePolynomial;

use super::SignalId;

/// Symbolic expressions over signals, used to state constraints.
///
/// Expressions are trees whose leaves are integer constants or signals. Constants are reduced
/// into the field of the model when the expression is lowered to a polynomial.
///
/// ```
/// use safecirc_core::constraint_system::{ConstraintModel, Expr};
///
/// let mut model = ConstraintModel::default();
/// let x = model.add_input("x");
/// let b = model.add_output("b");
/// // b * (b - 1) === 0
/// model.constrain(b * (b - 1)).unwrap();
/// // b <== x^2 + 3
/// model.assign(b, Expr::from(x).pow(2) + 3).unwrap();
/// assert_eq!(model.n_constraints(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
	Const(BigInt),
	Signal(SignalId),
	Add(Box<Expr>, Box<Expr>),
	Sub(Box<Expr>, Box<Expr>),
	Mul(Box<Expr>, Box<Expr>),
	Neg(Box<Expr>),
	Pow(Box<Expr>, u32),
}

impl Expr {
	pub fn constant(value: impl Into<BigInt>) -> Self {
		Self::Const(value.into())
	}

	pub fn pow(self, exp: u32) -> Self {
		Self::Pow(Box::new(self), exp)
	}

	/// The total degree of the expression tree, an upper bound on the degree of its polynomial.
	pub fn degree(&self) -> u32 {
		match self {
			Self::Const(_) => 0,
			Self::Signal(_) => 1,
			Self::Add(left, right) | Self::Sub(left, right) => left.degree().max(right.degree()),
			Self::Mul(left, right) => left.degree() + right.degree(),
			Self::Neg(inner) => inner.degree(),
			Self::Pow(base, exp) => base.degree() * exp,
		}
	}

	/// Lowers the expression to a polynomial whose variables are signal indices.
	pub fn to_polynomial(&self, field: &PrimeField) -> SparsePolynomial {
		match self {
			Self::Const(value) => SparsePolynomial::constant(field.from_bigint(value)),
			Self::Signal(id) => SparsePolynomial::var(id.index()),
			Self::Add(left, right) => left
				.to_polynomial(field)
				.add(&right.to_polynomial(field), field),
			Self::Sub(left, right) => left
				.to_polynomial(field)
				.sub(&right.to_polynomial(field), field),
			Self::Mul(left, right) => left
				.to_polynomial(field)
				.mul(&right.to_polynomial(field), field),
			Self::Neg(inner) => inner.to_polynomial(field).neg(field),
			Self::Pow(base, exp) => base.to_polynomial(field).pow(*exp, field),
		}
	}
}

impl Display for Expr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Const(v) => write!(f, "{v}"),
			Self::Signal(id) => write!(f, "{id}"),
			Self::Add(x, y) => write!(f, "({x} + {y})"),
			Self::Sub(x, y) => write!(f, "({x} - {y})"),
			Self::Mul(x, y) => write!(f, "({x} * {y})"),
			Self::Neg(x) => write!(f, "-{x}"),
			Self::Pow(x, p) => write!(f, "({x})^{p}"),
		}
	}
}

impl From<SignalId> for Expr {
	fn from(id: SignalId) -> Self {
		Self::Signal(id)
	}
}

impl From<BigInt> for Expr {
	fn from(value: BigInt) -> Self {
		Self::Const(value)
	}
}

impl From<i32> for Expr {
	fn from(value: i32) -> Self {
		Self::Const(value.into())
	}
}

impl From<i64> for Expr {
	fn from(value: i64) -> Self {
		Self::Const(value.into())
	}
}

impl From<u32> for Expr {
	fn from(value: u32) -> Self {
		Self::Const(value.into())
	}
}

impl From<u64> for Expr {
	fn from(value: u64) -> Self {
		Self::Const(value.into())
	}
}

impl<T: Into<Expr>> Add<T> for Expr {
	type Output = Expr;

	fn add(self, rhs: T) -> Expr {
		Expr::Add(Box::new(self), Box::new(rhs.into()))
	}
}

impl<T: Into<Expr>> Sub<T> for Expr {
	type Output = Expr;

	fn sub(self, rhs: T) -> Expr {
		Expr::Sub(Box::new(self), Box::new(rhs.into()))
	}
}

impl<T: Into<Expr>> Mul<T> for Expr {
	type Output = Expr;

	fn mul(self, rhs: T) -> Expr {
		Expr::Mul(Box::new(self), Box::new(rhs.into()))
	}
}

impl Neg for Expr {
	type Output = Expr;

	fn neg(self) -> Expr {
		Expr::Neg(Box::new(self))
	}
}

impl<T: Into<Expr>> Add<T> for SignalId {
	type Output = Expr;

	fn add(self, rhs: T) -> Expr {
		Expr::from(self) + rhs
	}
}

impl<T: Into<Expr>> Sub<T> for SignalId {
	type Output = Expr;

	fn sub(self, rhs: T) -> Expr {
		Expr::from(self) - rhs
	}
}

impl<T: Into<Expr>> Mul<T> for SignalId {
	type Output = Expr;

	fn mul(self, rhs: T) -> Expr {
		Expr::from(self) * rhs
	}
}

impl Neg for SignalId {
	type Output = Expr;

	fn neg(self) -> Expr {
		-Expr::from(self)
	}
}
