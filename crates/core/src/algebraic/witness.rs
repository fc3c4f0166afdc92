// Copyright 2024-2025 Irreducible Inc.

use rand::RngCore;
use safecirc_field::Fp;
use safecirc_math::{
	find_roots, BudgetMeter, Error, GroebnerBasis, PolyRing, Polynomial, UnivariatePoly,
};
use tracing::trace;

/// Values tried for a variable the elimination ideal leaves unconstrained.
const FREE_VALUES: [u64; 3] = [0, 1, 2];

/// Depth-first search for a rational point of an ideal, using lexicographic bases.
///
/// Variables are fixed from the smallest to the largest. At each step the reduced lex basis of
/// the ideal extended by the values chosen so far either contains a univariate polynomial in
/// the next variable, whose roots in the field are the candidates, or leaves the variable free.
/// A unit basis means the partial point does not extend, and the search backtracks.
#[derive(Debug)]
pub struct PointSearch<'a, R> {
	ring: &'a PolyRing,
	rng: R,
	max_branching: usize,
}

impl<'a, R: RngCore> PointSearch<'a, R> {
	/// ## Preconditions
	///
	/// * `ring` uses the lexicographic order
	pub fn new(ring: &'a PolyRing, rng: R, max_branching: usize) -> Self {
		Self {
			ring,
			rng,
			max_branching: max_branching.max(1),
		}
	}

	/// Returns a common zero of `generators` in the field, or `None` if none was found within
	/// the branching bound.
	pub fn find(
		&mut self,
		generators: &[Polynomial],
		meter: &mut BudgetMeter,
	) -> Result<Option<Vec<Fp>>, Error> {
		let mut point = vec![Fp::zero(); self.ring.n_vars()];
		let found = self.extend(generators, self.ring.n_vars(), &mut point, meter)?;
		Ok(found.then_some(point))
	}

	/// Fixes the variables below `unfixed` given the values already in `point[unfixed..]`.
	fn extend(
		&mut self,
		generators: &[Polynomial],
		unfixed: usize,
		point: &mut [Fp],
		meter: &mut BudgetMeter,
	) -> Result<bool, Error> {
		let basis = GroebnerBasis::compute(self.ring, generators, meter)?;
		if basis.is_unit() {
			return Ok(false);
		}
		let Some(var) = unfixed.checked_sub(1) else {
			return Ok(true);
		};

		let field = self.ring.field();
		let candidates = match basis.univariate_in(var) {
			Some(poly) => {
				let univariate = UnivariatePoly::new(poly.univariate_coeffs(var));
				match find_roots(field, &univariate, &mut self.rng, meter)? {
					Some(roots) => roots,
					None => self.free_values(),
				}
			}
			None => self.free_values(),
		};
		trace!(var, n_candidates = candidates.len(), "extending partial point");

		for value in candidates.into_iter().take(self.max_branching) {
			meter.checkpoint()?;
			let fixed = self
				.ring
				.sub(&self.ring.var(var)?, &self.ring.constant(value.clone()));
			let mut next = basis.polys().to_vec();
			next.push(fixed);
			point[var] = value;
			if self.extend(&next, var, point, meter)? {
				return Ok(true);
			}
		}
		Ok(false)
	}

	fn free_values(&self) -> Vec<Fp> {
		let field = self.ring.field();
		let mut values = FREE_VALUES
			.iter()
			.map(|&value| field.from_u64(value))
			.collect::<Vec<_>>();
		values.sort();
		values.dedup();
		values
	}
}
