// Copyright 2024-2025 Irreducible Inc.

use safecirc_field::{Fp, PrimeField};
use safecirc_math::{Error, PolyRing, Polynomial, TermOrder};

use crate::{task::LocalSystem, verdict::LocalWitnessPair};

/// The closure of a task stated twice over shared parameters, with the target copies forced
/// apart.
///
/// Ring variables, from largest to smallest:
///
/// * `u`, the auxiliary variable of `u * (t - t') - 1`
/// * the unknowns of the second copy, target first
/// * the unknowns of the first copy, target first
/// * the parameters
///
/// The system has a common zero exactly when two solutions of the closure agree on every
/// parameter and differ on the target.
#[derive(Debug, Clone)]
pub struct DoubledSystem {
	ring: PolyRing,
	generators: Vec<Polynomial>,
	/// Ring variable of each local label in the first copy.
	first: Vec<usize>,
	/// Ring variable of each local label in the second copy.
	second: Vec<usize>,
}

impl DoubledSystem {
	/// Ring variable of the auxiliary variable.
	pub const AUX: usize = 0;

	pub fn new(local: &LocalSystem, field: &PrimeField) -> Result<Self, Error> {
		let unknowns = local.unknowns().collect::<Vec<_>>();
		let parameters = local.parameters().collect::<Vec<_>>();
		let k = unknowns.len();
		let n_vars = 1 + 2 * k + parameters.len();

		let mut first = vec![0; local.n_signals()];
		let mut second = vec![0; local.n_signals()];
		for (i, &label) in unknowns.iter().enumerate() {
			second[label] = 1 + i;
			first[label] = 1 + k + i;
		}
		for (j, &label) in parameters.iter().enumerate() {
			first[label] = 1 + 2 * k + j;
			second[label] = first[label];
		}

		let ring = PolyRing::new(field.clone(), n_vars, TermOrder::GrevLex);
		let mut generators = Vec::with_capacity(2 * local.constraints().len() + 1);
		for poly in local.constraints() {
			let p1 = poly.to_dense(&ring, |label| first.get(label).copied())?;
			let p2 = poly.to_dense(&ring, |label| second.get(label).copied())?;
			let shared = p1 == p2;
			generators.push(p1);
			if !shared {
				generators.push(p2);
			}
		}

		// u * (t - t') - 1
		let target = LocalSystem::TARGET;
		let difference = ring.sub(&ring.var(first[target])?, &ring.var(second[target])?);
		let separation = ring.sub(&ring.mul(&ring.var(Self::AUX)?, &difference), &ring.one());
		generators.push(separation);

		Ok(Self {
			ring,
			generators,
			first,
			second,
		})
	}

	pub const fn ring(&self) -> &PolyRing {
		&self.ring
	}

	pub fn generators(&self) -> &[Polynomial] {
		&self.generators
	}

	pub fn n_vars(&self) -> usize {
		self.ring.n_vars()
	}

	/// Whether `point` is a common zero of the generators.
	pub fn is_zero(&self, point: &[Fp]) -> Result<bool, Error> {
		for generator in &self.generators {
			if !self.ring.evaluate(generator, point)?.is_zero() {
				return Ok(false);
			}
		}
		Ok(true)
	}

	/// Splits a point of the ring into the two local assignments it encodes.
	pub fn witness_pair(&self, point: &[Fp]) -> LocalWitnessPair {
		let project = |vars: &[usize]| vars.iter().map(|&var| point[var].clone()).collect();
		LocalWitnessPair {
			first: project(&self.first),
			second: project(&self.second),
		}
	}
}
