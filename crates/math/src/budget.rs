// Copyright 2025 Irreducible Inc.

use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::{Duration, Instant},
};

use safecirc_utils::bail;

use crate::error::{Error, Limit};

/// Resource limits for a single algebraic computation.
///
/// `None` disables the corresponding limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Budget {
	pub timeout: Option<Duration>,
	/// Largest total degree allowed for a polynomial entering the basis.
	pub max_degree: Option<u32>,
	pub max_basis_len: Option<usize>,
	/// Largest number of ring variables a computation may be started with.
	pub max_variables: Option<usize>,
	/// Largest number of checkpoints (S-pair reductions, splitting rounds, ...).
	pub max_steps: Option<u64>,
}

impl Default for Budget {
	fn default() -> Self {
		Self {
			timeout: Some(Duration::from_secs(5)),
			max_degree: Some(64),
			max_basis_len: Some(4096),
			max_variables: Some(151),
			max_steps: None,
		}
	}
}

impl Budget {
	pub const fn unlimited() -> Self {
		Self {
			timeout: None,
			max_degree: None,
			max_basis_len: None,
			max_variables: None,
			max_steps: None,
		}
	}

	/// A budget that is exhausted before any work is done.
	pub const fn zero() -> Self {
		Self {
			timeout: Some(Duration::ZERO),
			max_degree: Some(0),
			max_basis_len: Some(0),
			max_variables: Some(0),
			max_steps: Some(0),
		}
	}

	pub const fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub const fn with_max_degree(mut self, max_degree: u32) -> Self {
		self.max_degree = Some(max_degree);
		self
	}

	pub const fn with_max_steps(mut self, max_steps: u64) -> Self {
		self.max_steps = Some(max_steps);
		self
	}
}

/// Shared flag used to abandon in-flight computations.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::Release);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}
}

/// Tracks consumption of a [`Budget`] by one computation.
///
/// Long-running algorithms call [`BudgetMeter::checkpoint`] at well-defined points; the first
/// failing checkpoint aborts the computation with an error and nothing partial is returned.
#[derive(Debug, Clone)]
pub struct BudgetMeter {
	budget: Budget,
	started: Instant,
	deadline: Option<Instant>,
	steps: u64,
	token: CancellationToken,
}

impl BudgetMeter {
	pub fn new(budget: &Budget, token: CancellationToken) -> Self {
		let started = Instant::now();
		Self {
			budget: budget.clone(),
			started,
			deadline: budget.timeout.map(|timeout| started + timeout),
			steps: 0,
			token,
		}
	}

	pub fn unlimited() -> Self {
		Self::new(&Budget::unlimited(), CancellationToken::new())
	}

	pub const fn budget(&self) -> &Budget {
		&self.budget
	}

	pub const fn steps(&self) -> u64 {
		self.steps
	}

	pub fn elapsed(&self) -> Duration {
		self.started.elapsed()
	}

	/// Checks cancellation and the deadline without consuming a step.
	pub fn check_interrupted(&self) -> Result<(), Error> {
		if self.token.is_cancelled() {
			bail!(Error::Cancelled);
		}
		if let Some(deadline) = self.deadline {
			if Instant::now() >= deadline {
				bail!(Error::Timeout {
					elapsed: self.elapsed()
				});
			}
		}
		Ok(())
	}

	/// Consumes one step and checks cancellation, the deadline and the step bound.
	pub fn checkpoint(&mut self) -> Result<(), Error> {
		self.check_interrupted()?;
		if let Some(max) = self.budget.max_steps {
			if self.steps >= max {
				bail!(Error::ResourceExhausted {
					limit: Limit::Steps { max }
				});
			}
		}
		self.steps += 1;
		Ok(())
	}

	pub fn check_degree(&self, degree: u32) -> Result<(), Error> {
		match self.budget.max_degree {
			Some(max) if degree > max => Err(Error::ResourceExhausted {
				limit: Limit::Degree { max, got: degree },
			}),
			_ => Ok(()),
		}
	}

	pub fn check_basis_len(&self, len: usize) -> Result<(), Error> {
		match self.budget.max_basis_len {
			Some(max) if len > max => Err(Error::ResourceExhausted {
				limit: Limit::BasisLength { max },
			}),
			_ => Ok(()),
		}
	}

	pub fn check_variables(&self, n_vars: usize) -> Result<(), Error> {
		match self.budget.max_variables {
			Some(max) if n_vars > max => Err(Error::ResourceExhausted {
				limit: Limit::Variables { max, got: n_vars },
			}),
			_ => Ok(()),
		}
	}
}
