// Copyright 2025 Irreducible Inc.

//! Dense univariate polynomials over a prime field and root finding.

use num_bigint::BigUint;
use rand::RngCore;
use safecirc_field::{Fp, PrimeField};
use tracing::instrument;

use crate::{budget::BudgetMeter, error::Error};

/// Largest modulus for which roots are found by exhaustive evaluation.
const BRUTE_FORCE_MODULUS: u64 = 256;

/// A univariate polynomial with coefficients stored lowest degree first, without trailing zeros.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnivariatePoly {
	coeffs: Vec<Fp>,
}

impl UnivariatePoly {
	pub fn new(mut coeffs: Vec<Fp>) -> Self {
		while coeffs.last().is_some_and(Fp::is_zero) {
			coeffs.pop();
		}
		Self { coeffs }
	}

	pub fn zero() -> Self {
		Self::default()
	}

	pub fn constant(c: Fp) -> Self {
		Self::new(vec![c])
	}

	/// The polynomial `x`.
	pub fn x() -> Self {
		Self::new(vec![Fp::zero(), Fp::one()])
	}

	pub fn coeffs(&self) -> &[Fp] {
		&self.coeffs
	}

	pub fn is_zero(&self) -> bool {
		self.coeffs.is_empty()
	}

	/// Degree, or `None` for the zero polynomial.
	pub fn degree(&self) -> Option<usize> {
		self.coeffs.len().checked_sub(1)
	}

	pub fn leading_coeff(&self) -> Option<&Fp> {
		self.coeffs.last()
	}

	pub fn evaluate(&self, field: &PrimeField, x: &Fp) -> Fp {
		self.coeffs
			.iter()
			.rev()
			.fold(Fp::zero(), |acc, c| field.add(&field.mul(&acc, x), c))
	}

	pub fn add(&self, other: &Self, field: &PrimeField) -> Self {
		let len = self.coeffs.len().max(other.coeffs.len());
		let zero = Fp::zero();
		Self::new(
			(0..len)
				.map(|i| {
					let a = self.coeffs.get(i).unwrap_or(&zero);
					let b = other.coeffs.get(i).unwrap_or(&zero);
					field.add(a, b)
				})
				.collect(),
		)
	}

	pub fn sub(&self, other: &Self, field: &PrimeField) -> Self {
		let len = self.coeffs.len().max(other.coeffs.len());
		let zero = Fp::zero();
		Self::new(
			(0..len)
				.map(|i| {
					let a = self.coeffs.get(i).unwrap_or(&zero);
					let b = other.coeffs.get(i).unwrap_or(&zero);
					field.sub(a, b)
				})
				.collect(),
		)
	}

	pub fn mul(&self, other: &Self, field: &PrimeField) -> Self {
		if self.is_zero() || other.is_zero() {
			return Self::zero();
		}
		let mut out = vec![Fp::zero(); self.coeffs.len() + other.coeffs.len() - 1];
		for (i, a) in self.coeffs.iter().enumerate() {
			for (j, b) in other.coeffs.iter().enumerate() {
				out[i + j] = field.add(&out[i + j], &field.mul(a, b));
			}
		}
		Self::new(out)
	}

	pub fn make_monic(&self, field: &PrimeField) -> Self {
		match self.leading_coeff().and_then(|lead| field.inverse(lead)) {
			Some(inv) => Self::new(self.coeffs.iter().map(|c| field.mul(c, &inv)).collect()),
			None => self.clone(),
		}
	}

	/// Euclidean division, returning `(quotient, remainder)`.
	///
	/// ## Throws
	///
	/// * [`Error::FieldError`] if `divisor` is zero
	pub fn divrem(&self, divisor: &Self, field: &PrimeField) -> Result<(Self, Self), Error> {
		let lead_inv = divisor
			.leading_coeff()
			.and_then(|lead| field.inverse(lead))
			.ok_or(safecirc_field::Error::DivisionByZero)?;
		let divisor_degree = divisor.coeffs.len() - 1;

		let mut remainder = self.coeffs.clone();
		if remainder.len() <= divisor_degree {
			return Ok((Self::zero(), self.clone()));
		}
		let mut quotient = vec![Fp::zero(); remainder.len() - divisor_degree];
		for shift in (0..quotient.len()).rev() {
			let coeff = field.mul(&remainder[shift + divisor_degree], &lead_inv);
			if coeff.is_zero() {
				continue;
			}
			for (k, d) in divisor.coeffs.iter().enumerate() {
				remainder[shift + k] = field.sub(&remainder[shift + k], &field.mul(&coeff, d));
			}
			quotient[shift] = coeff;
		}
		remainder.truncate(divisor_degree);
		Ok((Self::new(quotient), Self::new(remainder)))
	}

	pub fn rem(&self, divisor: &Self, field: &PrimeField) -> Result<Self, Error> {
		Ok(self.divrem(divisor, field)?.1)
	}

	/// The monic greatest common divisor. `gcd(0, 0) = 0`.
	pub fn gcd(&self, other: &Self, field: &PrimeField) -> Self {
		let (mut a, mut b) = (self.clone(), other.clone());
		while !b.is_zero() {
			let r = match a.rem(&b, field) {
				Ok(r) => r,
				Err(_) => unreachable!("b is non-zero"),
			};
			a = b;
			b = r;
		}
		a.make_monic(field)
	}

	/// Computes `self^exp mod modulus` by square and multiply.
	pub fn pow_mod(
		&self,
		exp: &BigUint,
		modulus: &Self,
		field: &PrimeField,
	) -> Result<Self, Error> {
		let mut result = Self::constant(Fp::one()).rem(modulus, field)?;
		let base = self.rem(modulus, field)?;
		for bit in (0..exp.bits()).rev() {
			result = result.mul(&result, field).rem(modulus, field)?;
			if exp.bit(bit) {
				result = result.mul(&base, field).rem(modulus, field)?;
			}
		}
		Ok(result)
	}
}

/// Finds the distinct roots of `poly` in the field, in increasing order.
///
/// Small fields are searched exhaustively. Otherwise the roots are isolated as
/// `gcd(poly, x^p - x)` and split by random equal-degree factorization. The zero polynomial has
/// every element as a root and yields no list.
///
/// ## Throws
///
/// * [`Error::Timeout`] or [`Error::Cancelled`] if the meter is interrupted while splitting
#[instrument(skip_all, level = "trace", fields(degree = ?poly.degree()))]
pub fn find_roots(
	field: &PrimeField,
	poly: &UnivariatePoly,
	rng: &mut impl RngCore,
	meter: &BudgetMeter,
) -> Result<Option<Vec<Fp>>, Error> {
	if poly.is_zero() {
		return Ok(None);
	}
	if poly.degree() == Some(0) {
		return Ok(Some(Vec::new()));
	}

	if let Some(modulus) = small_modulus(field) {
		let roots = (0..modulus)
			.map(|x| field.from_u64(x))
			.filter(|x| poly.evaluate(field, x).is_zero())
			.collect();
		return Ok(Some(roots));
	}

	let f = poly.make_monic(field);
	let x = UnivariatePoly::x();
	let x_to_p = x.pow_mod(field.modulus(), &f, field)?;
	let split = f.gcd(&x_to_p.sub(&x, field), field);

	let mut roots = Vec::new();
	let mut work = vec![split];
	while let Some(g) = work.pop() {
		meter.check_interrupted()?;
		match g.degree() {
			None | Some(0) => {}
			Some(1) => roots.push(field.neg(&g.coeffs()[0])),
			Some(_) => {
				let shift = field.random(&mut *rng);
				let probe = UnivariatePoly::new(vec![shift, Fp::one()]);
				let h = probe.pow_mod(&field.half_order(), &g, field)?;
				let h = h.sub(&UnivariatePoly::constant(Fp::one()), field);
				let d = g.gcd(&h, field);
				match d.degree() {
					Some(degree) if degree > 0 && Some(degree) < g.degree() => {
						let (cofactor, _) = g.divrem(&d, field)?;
						work.push(d);
						work.push(cofactor);
					}
					_ => work.push(g),
				}
			}
		}
	}
	roots.sort();
	roots.dedup();
	Ok(Some(roots))
}

fn small_modulus(field: &PrimeField) -> Option<u64> {
	u64::try_from(field.modulus())
		.ok()
		.filter(|&modulus| modulus <= BRUTE_FORCE_MODULUS)
}
