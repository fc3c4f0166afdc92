// Copyright 2024-2025 Irreducible Inc.

//! Complete decision of local safety through Gröbner bases.
//!
//! A task is safe exactly when its doubled system, the closure stated twice over shared
//! parameters together with `u * (t - t') - 1`, has no solution in the algebraic closure of the
//! field. By the weak Nullstellensatz this is the case when the reduced basis of the generated
//! ideal is `{1}`. A basis other than `{1}` only shows the existence of a solution over the
//! algebraic closure, so an explicit point over the base field is searched before reporting the
//! task unsafe.
//!
//! The same machinery finds single points of plain constraint sets, which is how a local
//! counter-example is completed into an assignment of the whole model.

mod system;
mod witness;

use rand::{rngs::StdRng, SeedableRng};
use safecirc_field::{Fp, PrimeField};
use safecirc_math::{
	Budget, BudgetMeter, CancellationToken, Error, GroebnerBasis, PolyRing, SparsePolynomial,
	TermOrder,
};
use tracing::{debug, instrument};

pub use system::DoubledSystem;
pub use witness::PointSearch;

use crate::{
	task::LocalSystem,
	verdict::{Certificate, LocalVerdict, SafeEvidence, UnknownReason},
};

/// Decides tasks the heuristic rules leave open.
#[derive(Debug, Clone)]
pub struct AlgebraicVerifier {
	budget: Budget,
	seed: u64,
}

/// Outcome of searching a single common zero of a constraint set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Solution {
	/// A common zero over the base field, indexed by variable.
	Point(Vec<Fp>),
	/// The constraints generate the unit ideal, so no assignment exists at all.
	Empty,
	/// The ideal is proper but no point over the base field was found within the branching
	/// bound.
	NotFound,
}

impl Default for AlgebraicVerifier {
	fn default() -> Self {
		Self::new(Budget::default())
	}
}

impl AlgebraicVerifier {
	/// Candidate values explored per variable while extracting a witness.
	pub const MAX_BRANCHING: usize = 4;

	pub const fn new(budget: Budget) -> Self {
		Self { budget, seed: 0 }
	}

	/// Seeds the root finding randomness. Equal seeds give equal witnesses.
	pub const fn with_seed(mut self, seed: u64) -> Self {
		self.seed = seed;
		self
	}

	pub const fn budget(&self) -> &Budget {
		&self.budget
	}

	/// Decides whether the target of `local` is uniquely determined by its parameters.
	///
	/// Returns [`LocalVerdict::Unknown`] with [`UnknownReason::NoWitnessFound`] when the ideal is
	/// proper but no point over the base field was found within the branching bound.
	///
	/// ## Throws
	///
	/// * [`Error::Timeout`], [`Error::ResourceExhausted`] or [`Error::Cancelled`] when the budget
	///   runs out or `token` is cancelled
	#[instrument(
		"AlgebraicVerifier::verify",
		skip_all,
		level = "debug",
		fields(n_signals = local.n_signals(), n_constraints = local.constraints().len())
	)]
	pub fn verify(
		&self,
		local: &LocalSystem,
		field: &PrimeField,
		token: &CancellationToken,
	) -> Result<LocalVerdict, Error> {
		let mut meter = BudgetMeter::new(&self.budget, token.clone());
		let system = DoubledSystem::new(local, field)?;
		let basis = GroebnerBasis::compute(system.ring(), system.generators(), &mut meter)?;
		let stats = basis.stats();
		debug!(
			pairs_reduced = stats.pairs_reduced,
			basis_len = basis.len(),
			unit = basis.is_unit(),
			"computed basis of the doubled system"
		);

		if basis.is_unit() {
			return Ok(LocalVerdict::Safe(SafeEvidence::Algebraic(Certificate {
				order: system.ring().order(),
				n_vars: system.n_vars(),
				n_generators: system.generators().len(),
				pairs_reduced: stats.pairs_reduced,
				max_degree: stats.max_degree,
			})));
		}

		let Some(point) = self.search_point(system.ring(), &basis, &mut meter)? else {
			debug!("no point over the base field within the branching bound");
			return Ok(LocalVerdict::Unknown(UnknownReason::NoWitnessFound));
		};

		if !system.is_zero(&point)? {
			return Ok(LocalVerdict::Unknown(UnknownReason::NoWitnessFound));
		}
		let pair = system.witness_pair(&point);
		if !local.check_witness_pair(field, &pair) {
			return Ok(LocalVerdict::Unknown(UnknownReason::NoWitnessFound));
		}
		Ok(LocalVerdict::Unsafe(pair))
	}

	/// Searches a common zero of `constraints`, whose variables are `0..n_vars`.
	///
	/// ## Throws
	///
	/// * [`Error::Timeout`], [`Error::ResourceExhausted`] or [`Error::Cancelled`] when the budget
	///   runs out or `token` is cancelled
	/// * [`Error::VariableOutOfRange`] if a constraint mentions a variable beyond `n_vars`
	#[instrument(
		"AlgebraicVerifier::solve",
		skip_all,
		level = "debug",
		fields(n_vars = n_vars, n_constraints = constraints.len())
	)]
	pub fn solve(
		&self,
		constraints: &[SparsePolynomial],
		n_vars: usize,
		field: &PrimeField,
		token: &CancellationToken,
	) -> Result<Solution, Error> {
		let mut meter = BudgetMeter::new(&self.budget, token.clone());
		let ring = PolyRing::new(field.clone(), n_vars, TermOrder::GrevLex);
		let generators = constraints
			.iter()
			.map(|poly| poly.to_dense(&ring, |var| (var < n_vars).then_some(var)))
			.collect::<Result<Vec<_>, _>>()?;
		let basis = GroebnerBasis::compute(&ring, &generators, &mut meter)?;
		if basis.is_unit() {
			return Ok(Solution::Empty);
		}

		let Some(point) = self.search_point(&ring, &basis, &mut meter)? else {
			return Ok(Solution::NotFound);
		};
		for poly in constraints {
			if !poly.evaluate(field, |var| point.get(var).cloned())?.is_zero() {
				return Ok(Solution::NotFound);
			}
		}
		Ok(Solution::Point(point))
	}

	/// Converts a proper basis to lex order and extracts a point over the base field.
	fn search_point(
		&self,
		ring: &PolyRing,
		basis: &GroebnerBasis,
		meter: &mut BudgetMeter,
	) -> Result<Option<Vec<Fp>>, Error> {
		let lex = ring.with_order(TermOrder::Lex);
		let generators = basis
			.polys()
			.iter()
			.map(|p| lex.convert(p))
			.collect::<Vec<_>>();
		let rng = StdRng::seed_from_u64(self.seed);
		PointSearch::new(&lex, rng, Self::MAX_BRANCHING).find(&generators, meter)
	}
}

/// How an interrupted algebraic computation is reported.
pub const fn unknown_reason(err: &Error) -> UnknownReason {
	match err {
		Error::Timeout { .. } => UnknownReason::Timeout,
		Error::ResourceExhausted { .. } => UnknownReason::ResourceLimit,
		Error::Cancelled => UnknownReason::Cancelled,
		_ => UnknownReason::Fault,
	}
}
