// Copyright 2025 Irreducible Inc.

use std::{cmp::Ordering, fmt};

use safecirc_field::{Fp, PrimeField};

use crate::{
	budget::BudgetMeter,
	error::Error,
	monomial::{Monomial, TermOrder},
};

/// Number of reduction steps between two interruption checks in a metered normal form.
const REDUCTIONS_PER_CHECK: usize = 64;

/// A monomial with a non-zero coefficient.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
	pub coeff: Fp,
	pub monomial: Monomial,
}

/// A multivariate polynomial in dense-exponent representation.
///
/// Terms are stored with non-zero coefficients and strictly decreasing monomials with respect to
/// the order of the [`PolyRing`] that created the polynomial, so the leading term comes first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Polynomial {
	terms: Vec<Term>,
}

impl Polynomial {
	pub const fn zero() -> Self {
		Self { terms: Vec::new() }
	}

	pub fn is_zero(&self) -> bool {
		self.terms.is_empty()
	}

	pub fn terms(&self) -> &[Term] {
		&self.terms
	}

	pub fn len(&self) -> usize {
		self.terms.len()
	}

	pub fn is_empty(&self) -> bool {
		self.terms.is_empty()
	}

	pub fn leading_term(&self) -> Option<&Term> {
		self.terms.first()
	}

	pub fn leading_monomial(&self) -> Option<&Monomial> {
		self.terms.first().map(|term| &term.monomial)
	}

	/// Total degree, or zero for the zero polynomial.
	pub fn degree(&self) -> u32 {
		self.terms
			.iter()
			.map(|term| term.monomial.degree())
			.max()
			.unwrap_or(0)
	}

	/// Whether the polynomial is a non-zero constant, which generates the unit ideal.
	pub fn is_nonzero_constant(&self) -> bool {
		matches!(self.terms.as_slice(), [term] if term.monomial.is_one())
	}

	/// If every term is a power of one variable `x_v` and some term is non-constant, returns `v`.
	pub fn univariate_variable(&self) -> Option<usize> {
		let mut found = None;
		for term in &self.terms {
			let mut support = term.monomial.support();
			match (support.next(), support.next()) {
				(None, _) => {}
				(Some(var), None) => match found {
					None => found = Some(var),
					Some(prev) if prev == var => {}
					Some(_) => return None,
				},
				(Some(_), Some(_)) => return None,
			}
		}
		found
	}

	/// Coefficients of a univariate polynomial in `x_var`, lowest degree first.
	///
	/// ## Preconditions
	///
	/// * every term is a power of `x_var`
	pub fn univariate_coeffs(&self, var: usize) -> Vec<Fp> {
		let degree = self
			.terms
			.iter()
			.map(|term| term.monomial.exponent(var))
			.max()
			.unwrap_or(0);
		let mut coeffs = vec![Fp::zero(); degree as usize + 1];
		for term in &self.terms {
			coeffs[term.monomial.exponent(var) as usize] = term.coeff.clone();
		}
		coeffs
	}
}

/// A polynomial ring `GF(p)[x_0, ..., x_{n-1}]` with a fixed monomial order.
///
/// Polynomials do not own a reference to their ring. All arithmetic goes through the ring, which
/// keeps the term ordering invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyRing {
	field: PrimeField,
	n_vars: usize,
	order: TermOrder,
}

impl PolyRing {
	pub const fn new(field: PrimeField, n_vars: usize, order: TermOrder) -> Self {
		Self {
			field,
			n_vars,
			order,
		}
	}

	pub const fn field(&self) -> &PrimeField {
		&self.field
	}

	pub const fn n_vars(&self) -> usize {
		self.n_vars
	}

	pub const fn order(&self) -> TermOrder {
		self.order
	}

	/// The same ring with a different monomial order.
	pub fn with_order(&self, order: TermOrder) -> Self {
		Self {
			field: self.field.clone(),
			n_vars: self.n_vars,
			order,
		}
	}

	/// Re-sorts a polynomial of a ring with the same variables under this ring's order.
	pub fn convert(&self, p: &Polynomial) -> Polynomial {
		let mut terms = p.terms.clone();
		terms.sort_by(|a, b| self.order.cmp(&b.monomial, &a.monomial));
		Polynomial { terms }
	}

	pub fn constant(&self, c: Fp) -> Polynomial {
		self.monomial(c, Monomial::one(self.n_vars))
	}

	pub fn one(&self) -> Polynomial {
		self.constant(Fp::one())
	}

	/// The polynomial `x_var`.
	pub fn var(&self, var: usize) -> Result<Polynomial, Error> {
		if var >= self.n_vars {
			return Err(Error::VariableOutOfRange {
				var,
				n_vars: self.n_vars,
			});
		}
		Ok(self.monomial(Fp::one(), Monomial::var(self.n_vars, var, 1)))
	}

	pub fn monomial(&self, coeff: Fp, monomial: Monomial) -> Polynomial {
		debug_assert_eq!(monomial.n_vars(), self.n_vars);
		if coeff.is_zero() {
			return Polynomial::zero();
		}
		Polynomial {
			terms: vec![Term { coeff, monomial }],
		}
	}

	/// Builds a polynomial from arbitrary terms, combining repeated monomials and dropping zeros.
	pub fn from_terms(&self, terms: impl IntoIterator<Item = (Fp, Monomial)>) -> Polynomial {
		let mut terms = terms
			.into_iter()
			.map(|(coeff, monomial)| {
				debug_assert_eq!(monomial.n_vars(), self.n_vars);
				Term {
					coeff: self.field.reduce(coeff.into_value()),
					monomial,
				}
			})
			.collect::<Vec<_>>();
		terms.sort_by(|a, b| self.order.cmp(&b.monomial, &a.monomial));

		let mut combined: Vec<Term> = Vec::with_capacity(terms.len());
		for term in terms {
			match combined.last_mut() {
				Some(last) if last.monomial == term.monomial => {
					last.coeff = self.field.add(&last.coeff, &term.coeff);
				}
				_ => combined.push(term),
			}
		}
		combined.retain(|term| !term.coeff.is_zero());
		Polynomial { terms: combined }
	}

	/// Merges two sorted term sequences into `a + scale * b`.
	fn merge(&self, a: &[Term], b: &[Term], scale: Option<&Fp>) -> Polynomial {
		let scaled = |term: &Term| match scale {
			Some(s) => Term {
				coeff: self.field.mul(&term.coeff, s),
				monomial: term.monomial.clone(),
			},
			None => term.clone(),
		};

		let mut out = Vec::with_capacity(a.len() + b.len());
		let (mut i, mut j) = (0, 0);
		while i < a.len() && j < b.len() {
			match self.order.cmp(&a[i].monomial, &b[j].monomial) {
				Ordering::Greater => {
					out.push(a[i].clone());
					i += 1;
				}
				Ordering::Less => {
					let term = scaled(&b[j]);
					if !term.coeff.is_zero() {
						out.push(term);
					}
					j += 1;
				}
				Ordering::Equal => {
					let rhs = scaled(&b[j]);
					let coeff = self.field.add(&a[i].coeff, &rhs.coeff);
					if !coeff.is_zero() {
						out.push(Term {
							coeff,
							monomial: rhs.monomial,
						});
					}
					i += 1;
					j += 1;
				}
			}
		}
		out.extend(a[i..].iter().cloned());
		out.extend(
			b[j..]
				.iter()
				.map(scaled)
				.filter(|term| !term.coeff.is_zero()),
		);
		Polynomial { terms: out }
	}

	pub fn add(&self, a: &Polynomial, b: &Polynomial) -> Polynomial {
		self.merge(&a.terms, &b.terms, None)
	}

	pub fn sub(&self, a: &Polynomial, b: &Polynomial) -> Polynomial {
		let minus_one = self.field.neg(&Fp::one());
		self.merge(&a.terms, &b.terms, Some(&minus_one))
	}

	pub fn neg(&self, a: &Polynomial) -> Polynomial {
		Polynomial {
			terms: a
				.terms
				.iter()
				.map(|term| Term {
					coeff: self.field.neg(&term.coeff),
					monomial: term.monomial.clone(),
				})
				.collect(),
		}
	}

	pub fn scale(&self, a: &Polynomial, scalar: &Fp) -> Polynomial {
		if scalar.is_zero() {
			return Polynomial::zero();
		}
		Polynomial {
			terms: a
				.terms
				.iter()
				.map(|term| Term {
					coeff: self.field.mul(&term.coeff, scalar),
					monomial: term.monomial.clone(),
				})
				.collect(),
		}
	}

	/// Multiplies by `coeff * monomial`. Admissible orders are preserved by monomial shifts.
	pub fn mul_term(&self, a: &Polynomial, coeff: &Fp, monomial: &Monomial) -> Polynomial {
		if coeff.is_zero() {
			return Polynomial::zero();
		}
		Polynomial {
			terms: a
				.terms
				.iter()
				.map(|term| Term {
					coeff: self.field.mul(&term.coeff, coeff),
					monomial: term.monomial.mul(monomial),
				})
				.collect(),
		}
	}

	pub fn mul(&self, a: &Polynomial, b: &Polynomial) -> Polynomial {
		self.from_terms(a.terms.iter().flat_map(|x| {
			b.terms
				.iter()
				.map(move |y| (self.field.mul(&x.coeff, &y.coeff), x.monomial.mul(&y.monomial)))
		}))
	}

	/// Scales the polynomial so that its leading coefficient is one.
	pub fn make_monic(&self, a: &Polynomial) -> Polynomial {
		match a.leading_term().and_then(|lead| self.field.inverse(&lead.coeff)) {
			Some(inv) => self.scale(a, &inv),
			None => a.clone(),
		}
	}

	/// Evaluates the polynomial at `point`.
	///
	/// ## Throws
	///
	/// * [`Error::IncorrectArgumentLength`] if `point` does not have one value per variable
	pub fn evaluate(&self, a: &Polynomial, point: &[Fp]) -> Result<Fp, Error> {
		if point.len() != self.n_vars {
			return Err(Error::IncorrectArgumentLength {
				arg: "point".into(),
				expected: self.n_vars,
			});
		}
		let mut acc = Fp::zero();
		for term in &a.terms {
			let mut value = term.coeff.clone();
			for var in term.monomial.support() {
				let power = self
					.field
					.pow_u64(&point[var], term.monomial.exponent(var) as u64);
				value = self.field.mul(&value, &power);
			}
			acc = self.field.add(&acc, &value);
		}
		Ok(acc)
	}

	/// The S-polynomial `lcm/LT(f) * f - lcm/LT(g) * g` of two non-zero polynomials.
	pub fn s_polynomial(&self, f: &Polynomial, g: &Polynomial) -> Polynomial {
		let (Some(lf), Some(lg)) = (f.leading_term(), g.leading_term()) else {
			return Polynomial::zero();
		};
		let lcm = lf.monomial.lcm(&lg.monomial);
		let (Some(mf), Some(mg)) = (lcm.checked_div(&lf.monomial), lcm.checked_div(&lg.monomial))
		else {
			unreachable!("lcm is divisible by both leading monomials");
		};
		let (Some(cf), Some(cg)) = (self.field.inverse(&lf.coeff), self.field.inverse(&lg.coeff))
		else {
			unreachable!("leading coefficients are non-zero");
		};
		let left = self.mul_term(f, &cf, &mf);
		let right = self.mul_term(g, &cg, &mg);
		self.sub(&left, &right)
	}

	/// Fully reduces `f` modulo `divisors`, returning the remainder of multivariate division.
	pub fn normal_form(&self, f: &Polynomial, divisors: &[Polynomial]) -> Polynomial {
		match self.normal_form_metered(f, divisors, None) {
			Ok(remainder) => remainder,
			Err(_) => unreachable!("unmetered reduction cannot be interrupted"),
		}
	}

	/// Like [`Self::normal_form`], checking the meter for interruption while reducing.
	pub fn normal_form_metered(
		&self,
		f: &Polynomial,
		divisors: &[Polynomial],
		meter: Option<&BudgetMeter>,
	) -> Result<Polynomial, Error> {
		let lead_inverses = divisors
			.iter()
			.map(|g| {
				g.leading_term()
					.and_then(|lead| self.field.inverse(&lead.coeff))
			})
			.collect::<Vec<_>>();

		let mut remainder = Vec::new();
		let mut rest = f.clone();
		let mut reductions = 0;
		while let Some(lead) = rest.terms.first() {
			let divisor = divisors
				.iter()
				.zip(&lead_inverses)
				.find_map(|(g, inv)| {
					let g_lead = g.leading_term()?;
					let shift = lead.monomial.checked_div(&g_lead.monomial)?;
					Some((g, shift, inv.as_ref()?))
				});

			match divisor {
				Some((g, shift, inv)) => {
					let factor = self.field.neg(&self.field.mul(&lead.coeff, inv));
					let multiple = self.mul_term(g, &factor, &shift);
					rest = self.merge(&rest.terms, &multiple.terms, None);
					reductions += 1;
					if reductions % REDUCTIONS_PER_CHECK == 0 {
						if let Some(meter) = meter {
							meter.check_interrupted()?;
						}
					}
				}
				None => {
					let mut terms = std::mem::take(&mut rest.terms);
					let lead = terms.remove(0);
					remainder.push(lead);
					rest.terms = terms;
				}
			}
		}
		Ok(Polynomial { terms: remainder })
	}

	/// A printable view of a polynomial.
	pub fn display<'a>(&'a self, p: &'a Polynomial) -> impl fmt::Display + 'a {
		PolyDisplay { ring: self, p }
	}
}

struct PolyDisplay<'a> {
	ring: &'a PolyRing,
	p: &'a Polynomial,
}

impl fmt::Display for PolyDisplay<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.p.is_zero() {
			return write!(f, "0");
		}
		for (i, term) in self.p.terms.iter().enumerate() {
			let coeff = self.ring.field.signed(&term.coeff);
			let sign = coeff.sign() == num_bigint::Sign::Minus;
			let magnitude = coeff.magnitude();
			match (i, sign) {
				(0, true) => write!(f, "-")?,
				(0, false) => {}
				(_, true) => write!(f, " - ")?,
				(_, false) => write!(f, " + ")?,
			}
			let unit = num_traits::One::is_one(magnitude);
			match (unit, term.monomial.is_one()) {
				(true, false) => write!(f, "{}", term.monomial)?,
				(_, true) => write!(f, "{magnitude}")?,
				(false, false) => write!(f, "{magnitude}*{}", term.monomial)?,
			}
		}
		Ok(())
	}
}
