// Copyright 2024-2025 Irreducible Inc.

use std::{fmt, time::Duration};

use serde::Serialize;

use crate::{
	constraint_system::{ConstraintId, ScopeId, SignalId},
	verdict::{CircuitVerdict, HeuristicRule, TaskVerdict, UnknownReason, Verdict},
};

/// How far a task progressed through verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskStage {
	Pending,
	/// The heuristic rules ran and none decided the task.
	HeuristicChecked,
	/// The task was handed to the algebraic verifier.
	Escalated,
	Resolved,
}

/// What produced the verdict of a resolved task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResolvedBy {
	Heuristic(HeuristicRule),
	Algebra,
	/// No check ran, as for skipped or cancelled tasks.
	NotRun,
}

/// The outcome of one verification task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
	pub target: SignalId,
	/// Qualified name of the target, such as `main.c[0].out`.
	pub name: String,
	pub scope: ScopeId,
	pub cluster: usize,
	pub level: usize,
	pub closure: Vec<ConstraintId>,
	/// Signals treated as determined while verifying the target.
	pub parameters: Vec<SignalId>,
	pub stage: TaskStage,
	pub resolved_by: ResolvedBy,
	/// Whether the verdict was shared from an identical task.
	pub cache_hit: bool,
	/// Whether the closure was widened to whole connected components to confirm a
	/// counter-example. The closure and parameters are then those of the widened task.
	pub widened: bool,
	pub verdict: TaskVerdict,
}

/// Counters describing one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
	pub n_tasks: usize,
	pub n_clusters: usize,
	pub n_levels: usize,
	pub resolved_by_heuristics: usize,
	/// Tasks handed to the algebraic verifier, whatever its outcome.
	pub escalated: usize,
	/// Escalated tasks the algebraic verifier decided.
	pub resolved_by_algebra: usize,
	pub cache_hits: usize,
	pub cache_misses: usize,
	/// Tasks re-verified over whole connected components.
	pub widened: usize,
	pub skipped: usize,
	pub faults: usize,
	pub elapsed: Duration,
}

impl RunStats {
	pub(crate) fn record(&mut self, task: &TaskRecord) {
		self.n_tasks += 1;
		self.widened += usize::from(task.widened);
		match task.resolved_by {
			ResolvedBy::Heuristic(_) => self.resolved_by_heuristics += 1,
			ResolvedBy::Algebra => {
				self.escalated += 1;
				if !task.verdict.is_unknown() {
					self.resolved_by_algebra += 1;
				}
			}
			ResolvedBy::NotRun => {}
		}
		match task.verdict {
			Verdict::Unknown(UnknownReason::Skipped) => self.skipped += 1,
			Verdict::Unknown(UnknownReason::Fault) => self.faults += 1,
			_ => {}
		}
	}
}

/// The result of verifying a circuit.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
	pub verdict: CircuitVerdict,
	/// One record per target, in processing order.
	pub tasks: Vec<TaskRecord>,
	pub stats: RunStats,
}

impl VerificationReport {
	pub fn task(&self, target: SignalId) -> Option<&TaskRecord> {
		self.tasks.iter().find(|task| task.target == target)
	}

	pub fn unsafe_tasks(&self) -> impl Iterator<Item = &TaskRecord> + '_ {
		self.tasks.iter().filter(|task| task.verdict.is_unsafe())
	}

	pub fn unknown_tasks(&self) -> impl Iterator<Item = &TaskRecord> + '_ {
		self.tasks.iter().filter(|task| task.verdict.is_unknown())
	}
}

impl fmt::Display for VerificationReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(
			f,
			"circuit is {} ({} tasks, {} clusters, {:?})",
			self.verdict, self.stats.n_tasks, self.stats.n_clusters, self.stats.elapsed
		)?;
		for task in &self.tasks {
			match &task.verdict {
				Verdict::Safe(_) => {}
				Verdict::Unsafe(pair) => {
					let differing = pair.differing_signals().count();
					writeln!(f, "  {}: unsafe, {differing} signals differ", task.name)?;
				}
				Verdict::Unknown(reason) => writeln!(f, "  {}: unknown ({reason})", task.name)?,
			}
		}
		Ok(())
	}
}
