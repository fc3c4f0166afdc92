// Copyright 2024-2025 Irreducible Inc.

use std::time::Duration;

use num_bigint::BigUint;
use safecirc_math::Budget;
use safecirc_utils::env::{boolean_env_flag_set, parsed_env_var};

use crate::{decompose::DecompositionStrategy, heuristics::RuleSet};

/// What a run does after the first unsafe task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnsafeCollection {
	/// Stop and report the remaining tasks as skipped.
	#[default]
	ShortCircuit,
	/// Verify every task.
	Exhaustive,
}

/// Settings of a verification run.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
	/// Prime the model is required to use, if any.
	pub expected_prime: Option<BigUint>,
	/// Limits of each algebraic computation.
	pub budget: Budget,
	pub rules: RuleSet,
	pub unsafe_collection: UnsafeCollection,
	/// Whether identical local systems share one verdict.
	pub caching: bool,
	/// Whether tasks the heuristic rules leave open go to the algebraic verifier.
	pub algebraic_fallback: bool,
	pub strategy: DecompositionStrategy,
	/// Worker threads, defaulting to `RAYON_NUM_THREADS` or the number of logical CPUs.
	pub num_threads: Option<usize>,
	/// Seed of the randomness used by witness extraction.
	pub seed: u64,
}

impl Default for VerifierConfig {
	fn default() -> Self {
		Self {
			expected_prime: None,
			budget: Budget::default(),
			rules: RuleSet::all(),
			unsafe_collection: UnsafeCollection::ShortCircuit,
			caching: true,
			algebraic_fallback: true,
			strategy: DecompositionStrategy::Modular,
			num_threads: None,
			seed: 0,
		}
	}
}

impl VerifierConfig {
	/// The default configuration with overrides read from the environment:
	///
	/// * `SAFECIRC_EXHAUSTIVE` collects every unsafe task
	/// * `SAFECIRC_NO_CACHE` disables memoization
	/// * `SAFECIRC_NO_ALGEBRA` disables the algebraic fallback
	/// * `SAFECIRC_MONOLITHIC` verifies the circuit as a single cluster
	/// * `SAFECIRC_TIMEOUT_MS`, `SAFECIRC_MAX_DEGREE` and `SAFECIRC_MAX_STEPS` adjust the budget
	/// * `SAFECIRC_NUM_THREADS` sizes the worker pool
	pub fn from_env() -> Self {
		let mut config = Self::default();
		if boolean_env_flag_set("SAFECIRC_EXHAUSTIVE") {
			config.unsafe_collection = UnsafeCollection::Exhaustive;
		}
		if boolean_env_flag_set("SAFECIRC_NO_CACHE") {
			config.caching = false;
		}
		if boolean_env_flag_set("SAFECIRC_NO_ALGEBRA") {
			config.algebraic_fallback = false;
		}
		if boolean_env_flag_set("SAFECIRC_MONOLITHIC") {
			config.strategy = DecompositionStrategy::Monolithic;
		}
		if let Some(ms) = parsed_env_var::<u64>("SAFECIRC_TIMEOUT_MS") {
			config.budget.timeout = Some(Duration::from_millis(ms));
		}
		if let Some(max_degree) = parsed_env_var("SAFECIRC_MAX_DEGREE") {
			config.budget.max_degree = Some(max_degree);
		}
		if let Some(max_steps) = parsed_env_var("SAFECIRC_MAX_STEPS") {
			config.budget.max_steps = Some(max_steps);
		}
		if let Some(num_threads) = parsed_env_var("SAFECIRC_NUM_THREADS") {
			config.num_threads = Some(num_threads);
		}
		config
	}

	pub fn with_expected_prime(mut self, prime: BigUint) -> Self {
		self.expected_prime = Some(prime);
		self
	}

	pub fn with_budget(mut self, budget: Budget) -> Self {
		self.budget = budget;
		self
	}

	pub fn with_rules(mut self, rules: RuleSet) -> Self {
		self.rules = rules;
		self
	}

	pub fn with_unsafe_collection(mut self, unsafe_collection: UnsafeCollection) -> Self {
		self.unsafe_collection = unsafe_collection;
		self
	}

	pub fn exhaustive(self) -> Self {
		self.with_unsafe_collection(UnsafeCollection::Exhaustive)
	}

	pub fn with_caching(mut self, caching: bool) -> Self {
		self.caching = caching;
		self
	}

	pub fn with_algebraic_fallback(mut self, algebraic_fallback: bool) -> Self {
		self.algebraic_fallback = algebraic_fallback;
		self
	}

	pub fn with_strategy(mut self, strategy: DecompositionStrategy) -> Self {
		self.strategy = strategy;
		self
	}

	pub fn with_num_threads(mut self, num_threads: usize) -> Self {
		self.num_threads = Some(num_threads);
		self
	}

	pub fn with_seed(mut self, seed: u64) -> Self {
		self.seed = seed;
		self
	}
}
