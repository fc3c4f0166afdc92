// Copyright 2025 Irreducible Inc.

use std::collections::HashSet;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
	budget::BudgetMeter,
	error::Error,
	monomial::Monomial,
	polynomial::{PolyRing, Polynomial},
};

/// Counters collected while computing a Gröbner basis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroebnerStats {
	/// Critical pairs taken from the queue.
	pub pairs_considered: usize,
	/// Pairs whose S-polynomial was actually reduced.
	pub pairs_reduced: usize,
	/// Pairs discarded because their leading monomials are coprime.
	pub skipped_by_product: usize,
	/// Pairs discarded by Buchberger's chain criterion.
	pub skipped_by_chain: usize,
	/// Reduced S-polynomials that vanished.
	pub zero_reductions: usize,
	/// Largest total degree of a polynomial added to the basis.
	pub max_degree: u32,
}

#[derive(Debug)]
struct CriticalPair {
	i: usize,
	j: usize,
	lcm: Monomial,
}

/// The reduced Gröbner basis of an ideal, with respect to the order of its ring.
///
/// The basis is monic, inter-reduced and sorted by increasing leading monomial. The unit ideal
/// has the basis `{1}` and the zero ideal has the empty basis.
#[derive(Debug, Clone)]
pub struct GroebnerBasis {
	ring: PolyRing,
	polys: Vec<Polynomial>,
	stats: GroebnerStats,
}

impl GroebnerBasis {
	/// Runs Buchberger's algorithm with the normal selection strategy.
	///
	/// The meter is checked before the first pair and after every S-pair reduction. The degree
	/// and length bounds of its budget are checked whenever a polynomial joins the basis.
	///
	/// ## Throws
	///
	/// * [`Error::ResourceExhausted`], [`Error::Timeout`] or [`Error::Cancelled`] when the budget
	///   runs out; no partial basis is returned
	#[instrument(
		"GroebnerBasis::compute",
		skip_all,
		level = "debug",
		fields(n_vars = ring.n_vars(), n_generators = generators.len())
	)]
	pub fn compute(
		ring: &PolyRing,
		generators: &[Polynomial],
		meter: &mut BudgetMeter,
	) -> Result<Self, Error> {
		meter.check_variables(ring.n_vars())?;
		meter.checkpoint()?;

		let mut stats = GroebnerStats::default();
		let mut basis = Vec::<Polynomial>::new();
		for generator in generators {
			if generator.is_zero() {
				continue;
			}
			if generator.is_nonzero_constant() {
				return Ok(Self::unit(ring, stats));
			}
			meter.check_degree(generator.degree())?;
			stats.max_degree = stats.max_degree.max(generator.degree());
			basis.push(ring.make_monic(generator));
		}
		meter.check_basis_len(basis.len())?;

		let mut queue = Vec::new();
		let mut pending = HashSet::new();
		for (i, j) in (0..basis.len()).tuple_combinations() {
			Self::push_pair(&basis, &mut queue, &mut pending, i, j);
		}

		while let Some(CriticalPair { i, j, lcm }) = Self::select(ring, &mut queue) {
			pending.remove(&(i, j));
			stats.pairs_considered += 1;

			let (lm_i, lm_j) = (lead(&basis[i]), lead(&basis[j]));
			if lm_i.is_coprime(lm_j) {
				stats.skipped_by_product += 1;
				continue;
			}
			if Self::chain_criterion(&basis, &pending, i, j, &lcm) {
				stats.skipped_by_chain += 1;
				continue;
			}

			let s = ring.s_polynomial(&basis[i], &basis[j]);
			let remainder = ring.normal_form_metered(&s, &basis, Some(meter))?;
			stats.pairs_reduced += 1;
			meter.checkpoint()?;

			if remainder.is_zero() {
				stats.zero_reductions += 1;
				continue;
			}
			if remainder.is_nonzero_constant() {
				return Ok(Self::unit(ring, stats));
			}

			let degree = remainder.degree();
			meter.check_degree(degree)?;
			stats.max_degree = stats.max_degree.max(degree);

			let new = basis.len();
			basis.push(ring.make_monic(&remainder));
			meter.check_basis_len(basis.len())?;
			for i in 0..new {
				Self::push_pair(&basis, &mut queue, &mut pending, i, new);
			}
		}

		let polys = Self::reduce_basis(ring, basis, meter)?;
		debug!(
			basis_len = polys.len(),
			pairs_reduced = stats.pairs_reduced,
			zero_reductions = stats.zero_reductions,
			"Gröbner basis computed"
		);
		Ok(Self {
			ring: ring.clone(),
			polys,
			stats,
		})
	}

	fn unit(ring: &PolyRing, stats: GroebnerStats) -> Self {
		debug!(pairs_reduced = stats.pairs_reduced, "ideal is the unit ideal");
		Self {
			ring: ring.clone(),
			polys: vec![ring.one()],
			stats,
		}
	}

	fn push_pair(
		basis: &[Polynomial],
		queue: &mut Vec<CriticalPair>,
		pending: &mut HashSet<(usize, usize)>,
		i: usize,
		j: usize,
	) {
		let lcm = lead(&basis[i]).lcm(lead(&basis[j]));
		pending.insert((i, j));
		queue.push(CriticalPair { i, j, lcm });
	}

	/// Removes and returns the pair with the smallest lcm, ties broken by creation order.
	fn select(ring: &PolyRing, queue: &mut Vec<CriticalPair>) -> Option<CriticalPair> {
		let order = ring.order();
		let best = queue
			.iter()
			.enumerate()
			.min_by(|(_, a), (_, b)| {
				order
					.cmp(&a.lcm, &b.lcm)
					.then_with(|| (a.j, a.i).cmp(&(b.j, b.i)))
			})
			.map(|(index, _)| index)?;
		Some(queue.swap_remove(best))
	}

	/// A pair `(i, j)` is redundant when some other `k` has a leading monomial dividing the lcm
	/// and both pairs `(i, k)` and `(j, k)` have already been treated.
	fn chain_criterion(
		basis: &[Polynomial],
		pending: &HashSet<(usize, usize)>,
		i: usize,
		j: usize,
		lcm: &Monomial,
	) -> bool {
		let key = |a: usize, b: usize| (a.min(b), a.max(b));
		(0..basis.len()).any(|k| {
			k != i
				&& k != j
				&& lead(&basis[k]).divides(lcm)
				&& !pending.contains(&key(i, k))
				&& !pending.contains(&key(j, k))
		})
	}

	/// Minimizes and inter-reduces a Gröbner basis into the reduced basis.
	fn reduce_basis(
		ring: &PolyRing,
		basis: Vec<Polynomial>,
		meter: &BudgetMeter,
	) -> Result<Vec<Polynomial>, Error> {
		let mut minimal: Vec<Polynomial> = Vec::with_capacity(basis.len());
		for (index, g) in basis.iter().enumerate() {
			let lm = lead(g);
			let redundant = basis.iter().enumerate().any(|(other, h)| {
				let lh = lead(h);
				other != index && lh.divides(lm) && (lh != lm || other < index)
			});
			if !redundant {
				minimal.push(g.clone());
			}
		}

		let mut reduced = Vec::with_capacity(minimal.len());
		for index in 0..minimal.len() {
			meter.check_interrupted()?;
			let others = minimal
				.iter()
				.enumerate()
				.filter(|&(other, _)| other != index)
				.map(|(_, h)| h.clone())
				.collect::<Vec<_>>();
			let g = ring.normal_form_metered(&minimal[index], &others, Some(meter))?;
			reduced.push(ring.make_monic(&g));
		}
		reduced.sort_by(|a, b| ring.order().cmp(lead(a), lead(b)));
		Ok(reduced)
	}

	pub const fn ring(&self) -> &PolyRing {
		&self.ring
	}

	pub fn polys(&self) -> &[Polynomial] {
		&self.polys
	}

	pub const fn stats(&self) -> &GroebnerStats {
		&self.stats
	}

	pub fn len(&self) -> usize {
		self.polys.len()
	}

	pub fn is_empty(&self) -> bool {
		self.polys.is_empty()
	}

	/// Whether the ideal is the whole ring, meaning the generators have no common zero over the
	/// algebraic closure.
	pub fn is_unit(&self) -> bool {
		matches!(self.polys.as_slice(), [p] if p.is_nonzero_constant())
	}

	/// The normal form of `p` modulo the ideal.
	pub fn reduce(&self, p: &Polynomial) -> Polynomial {
		self.ring.normal_form(p, &self.polys)
	}

	/// Ideal membership.
	pub fn contains(&self, p: &Polynomial) -> bool {
		self.reduce(p).is_zero()
	}

	/// The basis element of lowest degree involving only `x_var`, if any.
	pub fn univariate_in(&self, var: usize) -> Option<&Polynomial> {
		self.polys
			.iter()
			.filter(|p| p.univariate_variable() == Some(var))
			.min_by_key(|p| p.degree())
	}
}

fn lead(p: &Polynomial) -> &Monomial {
	p.leading_monomial()
		.expect("basis polynomials are non-zero")
}
