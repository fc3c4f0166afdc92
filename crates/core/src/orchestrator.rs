// Copyright 2024-2025 Irreducible Inc.

//! Scheduling of verification tasks over a decomposition and assembly of the report.
//!
//! Levels of the decomposition run one after another. The clusters of a level run in parallel
//! on a bounded worker pool, and the targets of a cluster run sequentially in signal order.
//! A target proven safe becomes a parameter of every task that starts after it: later targets
//! of the same cluster and every cluster of a later level.
//!
//! A local counter-example only covers the constraints of its closure. Before it is reported,
//! the closure is widened to the whole connected components it touches, and the resulting
//! pair is completed with one shared assignment of every other component. The completed pair
//! must satisfy every constraint of the model.

use std::{
	panic::{catch_unwind, AssertUnwindSafe},
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, OnceLock,
	},
	time::Instant,
};

use itertools::Itertools;
use rayon::prelude::*;
use safecirc_field::Fp;
use safecirc_math::CancellationToken;
use safecirc_utils::{ensure, rayon::build_thread_pool};
use tracing::{debug, info, instrument, warn};

use crate::{
	algebraic::{unknown_reason, AlgebraicVerifier, Solution},
	cache::VerdictCache,
	config::{UnsafeCollection, VerifierConfig},
	constraint_system::{Components, ConstraintModel, DependencyGraph, SignalId, StructuralError},
	decompose::{Cluster, Decomposition},
	error::Error,
	heuristics,
	report::{ResolvedBy, RunStats, TaskRecord, TaskStage, VerificationReport},
	task::{LocalSystem, VerificationTask},
	verdict::{
		CircuitVerdict, LocalVerdict, LocalWitnessPair, SafeEvidence, TaskVerdict, UnknownReason,
		Verdict, WitnessPair,
	},
};

/// How the verdict of a local system was reached. Shared between identical tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
	pub verdict: LocalVerdict,
	pub stage: TaskStage,
	pub resolved_by: ResolvedBy,
}

impl Resolution {
	fn is_cacheable(&self) -> bool {
		match &self.verdict {
			Verdict::Unknown(reason) => reason.is_cacheable(),
			_ => true,
		}
	}
}

/// Memoized resolutions keyed by canonical local system.
pub type ResolutionCache = VerdictCache<Arc<LocalSystem>, Resolution>;

/// Values of one connected component shared by both assignments of a completed witness pair.
#[derive(Debug, Clone)]
enum Fill {
	/// A solution of the component's constraints, in the order of the component's signals.
	Point(Vec<Fp>),
	/// The component, hence the whole model, admits no assignment.
	Empty,
	Unknown(UnknownReason),
}

/// State shared by the tasks of one run.
#[derive(Debug)]
struct RunState {
	stop: AtomicBool,
	/// Lazily computed fill of each connected component.
	fills: Vec<OnceLock<Fill>>,
}

/// Everything a verification run reads: the model with its dependency graph and connected
/// components, the configuration, the memoization cache and the cancellation token.
///
/// The cache outlives a run, so verifying the same context again reuses every published
/// resolution.
#[derive(Debug)]
pub struct VerificationContext<'a> {
	model: &'a ConstraintModel,
	graph: DependencyGraph,
	components: Components,
	config: VerifierConfig,
	algebra: AlgebraicVerifier,
	cache: ResolutionCache,
	token: CancellationToken,
}

impl<'a> VerificationContext<'a> {
	/// ## Throws
	///
	/// * [`StructuralError`] if the model or its dependency graph is malformed, or if the model
	///   is not over the expected prime field
	pub fn new(model: &'a ConstraintModel, config: VerifierConfig) -> Result<Self, Error> {
		if let Some(expected) = &config.expected_prime {
			let got = model.field().modulus();
			ensure!(
				got == expected,
				StructuralError::FieldMismatch {
					expected: expected.clone(),
					got: got.clone(),
				}
			);
		}
		model.validate()?;
		let graph = DependencyGraph::new(model);
		graph.validate(model)?;
		let components = graph.components();

		let algebra = AlgebraicVerifier::new(config.budget.clone()).with_seed(config.seed);
		Ok(Self {
			model,
			graph,
			components,
			config,
			algebra,
			cache: ResolutionCache::new(),
			token: CancellationToken::new(),
		})
	}

	/// Uses `token` to abandon runs of this context.
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.token = token;
		self
	}

	pub const fn model(&self) -> &ConstraintModel {
		self.model
	}

	pub const fn graph(&self) -> &DependencyGraph {
		&self.graph
	}

	pub const fn components(&self) -> &Components {
		&self.components
	}

	pub const fn config(&self) -> &VerifierConfig {
		&self.config
	}

	pub const fn cache(&self) -> &ResolutionCache {
		&self.cache
	}

	pub const fn cancellation_token(&self) -> &CancellationToken {
		&self.token
	}

	pub fn decomposition(&self) -> Decomposition {
		Decomposition::new(self.model, &self.graph, self.config.strategy)
	}

	/// Verifies every output and intermediate signal of the model.
	///
	/// Task failures, budget exhaustion and cancellation are reported as unknown verdicts.
	///
	/// ## Throws
	///
	/// * [`Error::ThreadPool`] if the worker pool cannot be created
	#[instrument(
		"VerificationContext::run",
		skip_all,
		level = "debug",
		fields(n_signals = self.model.n_signals(), n_constraints = self.model.n_constraints())
	)]
	pub fn run(&self) -> Result<VerificationReport, Error> {
		let started = Instant::now();
		let pool = build_thread_pool(self.config.num_threads)?;
		let decomposition = self.decomposition();
		let (hits, misses) = (self.cache.hits(), self.cache.misses());
		debug!(
			n_clusters = decomposition.clusters().len(),
			n_levels = decomposition.n_levels(),
			n_threads = pool.current_num_threads(),
			"decomposed model"
		);

		let state = RunState {
			stop: AtomicBool::new(false),
			fills: (0..self.components.len()).map(|_| OnceLock::new()).collect(),
		};
		let mut safe = vec![false; self.model.n_signals()];
		let mut tasks = Vec::with_capacity(decomposition.n_targets());
		for level in decomposition.levels() {
			let records = pool.install(|| {
				level
					.par_iter()
					.map(|cluster| self.verify_cluster(cluster, &safe, &state))
					.collect::<Vec<_>>()
			});
			for record in records.into_iter().flatten() {
				if record.verdict.is_safe() {
					safe[record.target.index()] = true;
				}
				tasks.push(record);
			}
		}

		let mut stats = RunStats {
			n_clusters: decomposition.clusters().len(),
			n_levels: decomposition.n_levels(),
			cache_hits: self.cache.hits() - hits,
			cache_misses: self.cache.misses() - misses,
			..RunStats::default()
		};
		for task in &tasks {
			stats.record(task);
		}
		stats.elapsed = started.elapsed();

		let verdict = CircuitVerdict::combine(tasks.iter().map(|task| task.verdict.kind()));
		info!(
			%verdict,
			n_tasks = stats.n_tasks,
			by_heuristics = stats.resolved_by_heuristics,
			escalated = stats.escalated,
			widened = stats.widened,
			cache_hits = stats.cache_hits,
			skipped = stats.skipped,
			elapsed = ?stats.elapsed,
			"verification finished"
		);
		Ok(VerificationReport {
			verdict,
			tasks,
			stats,
		})
	}

	fn verify_cluster(
		&self,
		cluster: &Cluster,
		safe: &[bool],
		state: &RunState,
	) -> Vec<TaskRecord> {
		let mut proven = Vec::new();
		let mut records = Vec::with_capacity(cluster.signals.len());
		for &target in &cluster.signals {
			let is_parameter = |signal: SignalId| {
				self.model.signal(signal).role.is_parameter()
					|| safe[signal.index()]
					|| proven.contains(&signal)
			};
			let task = VerificationTask::new(
				self.model,
				target,
				cluster.index,
				cluster.closure.clone(),
				is_parameter,
			);
			let record = self.verify_task(cluster, &task, &is_parameter, state);
			if record.verdict.is_safe() {
				proven.push(target);
			}
			records.push(record);
		}
		records
	}

	fn verify_task(
		&self,
		cluster: &Cluster,
		task: &VerificationTask,
		is_parameter: &impl Fn(SignalId) -> bool,
		state: &RunState,
	) -> TaskRecord {
		let mut record = TaskRecord {
			target: task.target,
			name: self.model.qualified_name(task.target),
			scope: self.model.signal(task.target).scope,
			cluster: cluster.index,
			level: cluster.level,
			closure: task.closure.clone(),
			parameters: task.parameters().collect(),
			stage: TaskStage::Pending,
			resolved_by: ResolvedBy::NotRun,
			cache_hit: false,
			widened: false,
			verdict: Verdict::Unknown(UnknownReason::Skipped),
		};
		if self.token.is_cancelled() {
			record.verdict = Verdict::Unknown(UnknownReason::Cancelled);
			return record;
		}
		if state.stop.load(Ordering::Acquire) {
			return record;
		}

		let (resolution, cache_hit) = self.lookup(task);
		record.stage = resolution.stage;
		record.resolved_by = resolution.resolved_by;
		record.cache_hit = cache_hit;
		let verdict = match resolution.verdict {
			Verdict::Unsafe(pair) => self.confirm(task, pair, is_parameter, state, &mut record),
			Verdict::Safe(evidence) => Verdict::Safe(evidence),
			Verdict::Unknown(reason) => Verdict::Unknown(reason),
		};
		record.verdict = verdict;
		debug!(
			signal = %record.name,
			verdict = %record.verdict.kind(),
			resolved_by = ?record.resolved_by,
			cache_hit = record.cache_hit,
			widened = record.widened,
			"task finished"
		);

		let short_circuit = self.config.unsafe_collection == UnsafeCollection::ShortCircuit;
		if record.verdict.is_unsafe() && short_circuit {
			state.stop.store(true, Ordering::Release);
		}
		record
	}

	/// Resolves `task` through the cache when caching is enabled. Also tells whether the
	/// resolution was shared from an identical task.
	fn lookup(&self, task: &VerificationTask) -> (Resolution, bool) {
		if !self.config.caching {
			return (self.resolve(task), false);
		}
		let lookup = self.cache.get_or_compute(
			task.local.clone(),
			|| self.resolve(task),
			Resolution::is_cacheable,
		);
		let hit = lookup.is_hit();
		(lookup.into_value(), hit)
	}

	/// Turns a local counter-example into a counter-example for the whole model, or into the
	/// verdict of the task widened to the connected components it touches.
	fn confirm(
		&self,
		task: &VerificationTask,
		pair: LocalWitnessPair,
		is_parameter: &impl Fn(SignalId) -> bool,
		state: &RunState,
		record: &mut TaskRecord,
	) -> TaskVerdict {
		let field = self.model.field();
		if !task.local.check_witness_pair(field, &pair) {
			warn!(signal = %record.name, "discarding a witness pair that does not check out");
			return Verdict::Unknown(UnknownReason::Fault);
		}

		let touched = task
			.signals
			.iter()
			.map(|&signal| self.components.component_of(signal))
			.sorted_unstable()
			.dedup()
			.collect::<Vec<_>>();
		let n_constraints = touched
			.iter()
			.map(|&component| self.components.constraints(component).len())
			.sum::<usize>();
		// Closure constraints all lie in the touched components.
		if task.closure.len() == n_constraints {
			return self.complete(task.target, task.globalize(pair), state);
		}

		let closure = touched
			.iter()
			.map(|&component| self.components.constraints(component))
			.kmerge()
			.copied()
			.collect::<Vec<_>>();
		debug!(
			signal = %record.name,
			from = task.closure.len(),
			to = closure.len(),
			"widening the closure to confirm a counter-example"
		);
		let widened =
			VerificationTask::new(self.model, task.target, task.cluster, closure, is_parameter);
		let (resolution, cache_hit) = self.lookup(&widened);
		record.widened = true;
		record.closure = widened.closure.clone();
		record.parameters = widened.parameters().collect();
		record.stage = resolution.stage;
		record.resolved_by = resolution.resolved_by;
		record.cache_hit = cache_hit;
		match resolution.verdict {
			Verdict::Unsafe(pair) if widened.local.check_witness_pair(field, &pair) => {
				self.complete(task.target, widened.globalize(pair), state)
			}
			Verdict::Unsafe(_) => {
				warn!(signal = %record.name, "discarding a witness pair that does not check out");
				Verdict::Unknown(UnknownReason::Fault)
			}
			Verdict::Safe(evidence) => Verdict::Safe(evidence),
			Verdict::Unknown(reason) => Verdict::Unknown(reason),
		}
	}

	/// Extends a pair covering whole connected components to every signal of the model and
	/// checks both assignments against every constraint.
	fn complete(&self, target: SignalId, pair: WitnessPair, state: &RunState) -> TaskVerdict {
		if !self.components.constant_constraints().is_empty() {
			return Verdict::Safe(SafeEvidence::NoAssignment);
		}

		let n_signals = self.model.n_signals();
		let mut first = Vec::with_capacity(n_signals);
		let mut second = Vec::with_capacity(n_signals);
		for index in 0..n_signals {
			let signal = SignalId::from_index(index);
			if let Some((a, b)) = pair.first.get(&signal).zip(pair.second.get(&signal)) {
				first.push(a.clone());
				second.push(b.clone());
				continue;
			}
			let component = self.components.component_of(signal);
			match self.fill(component, state) {
				Fill::Point(values) => {
					let value = &values[self.components.position_of(signal)];
					first.push(value.clone());
					second.push(value.clone());
				}
				Fill::Empty => return Verdict::Safe(SafeEvidence::NoAssignment),
				Fill::Unknown(reason) => return Verdict::Unknown(*reason),
			}
		}

		let satisfied = [&first, &second].into_iter().all(|witness| {
			self.model
				.validate_witness(witness)
				.is_ok_and(|violated| violated.is_empty())
		});
		let inputs_agree = self
			.model
			.signals()
			.filter(|(_, signal)| signal.role.is_parameter())
			.all(|(id, _)| first[id.index()] == second[id.index()]);
		if !satisfied || !inputs_agree || first[target.index()] == second[target.index()] {
			warn!(
				signal = %self.model.qualified_name(target),
				satisfied,
				inputs_agree,
				"completed witness pair does not check out"
			);
			return Verdict::Unknown(UnknownReason::Fault);
		}

		let label = |values: Vec<Fp>| {
			values
				.into_iter()
				.enumerate()
				.map(|(index, value)| (SignalId::from_index(index), value))
				.collect()
		};
		Verdict::Unsafe(WitnessPair {
			first: label(first),
			second: label(second),
		})
	}

	fn fill<'s>(&self, component: usize, state: &'s RunState) -> &'s Fill {
		state.fills[component].get_or_init(|| self.solve_component(component))
	}

	/// Searches one assignment of the constraints of `component`.
	fn solve_component(&self, component: usize) -> Fill {
		let signals = self.components.signals(component);
		let constraints = self.components.constraints(component);
		if constraints.is_empty() {
			return Fill::Point(vec![Fp::zero(); signals.len()]);
		}

		let field = self.model.field();
		let polys = constraints
			.iter()
			.map(|&id| {
				self.model.constraint(id).poly().map_variables(field, |var| {
					self.components.position_of(SignalId::from_index(var))
				})
			})
			.collect::<Vec<_>>();
		let outcome = catch_unwind(AssertUnwindSafe(|| {
			self.algebra.solve(&polys, signals.len(), field, &self.token)
		}));
		match outcome {
			Ok(Ok(Solution::Point(values))) => Fill::Point(values),
			Ok(Ok(Solution::Empty)) => {
				debug!(component, "connected component admits no assignment");
				Fill::Empty
			}
			Ok(Ok(Solution::NotFound)) => Fill::Unknown(UnknownReason::NoWitnessFound),
			Ok(Err(err)) => {
				debug!(component, %err, "solving a connected component was interrupted");
				Fill::Unknown(unknown_reason(&err))
			}
			Err(_) => {
				warn!(
					component,
					n_constraints = constraints.len(),
					"solving a connected component panicked"
				);
				Fill::Unknown(UnknownReason::Fault)
			}
		}
	}

	/// Runs the heuristic rules and, if none applies, the algebraic verifier.
	fn resolve(&self, task: &VerificationTask) -> Resolution {
		let field = self.model.field();
		if let Some((rule, verdict)) = heuristics::check(&task.local, field, self.config.rules) {
			return Resolution {
				verdict,
				stage: TaskStage::Resolved,
				resolved_by: ResolvedBy::Heuristic(rule),
			};
		}
		if !self.config.algebraic_fallback {
			return Resolution {
				verdict: Verdict::Unknown(UnknownReason::NoApplicableRule),
				stage: TaskStage::HeuristicChecked,
				resolved_by: ResolvedBy::NotRun,
			};
		}

		let outcome =
			catch_unwind(AssertUnwindSafe(|| self.algebra.verify(&task.local, field, &self.token)));
		let verdict = match outcome {
			Ok(Ok(verdict)) => verdict,
			Ok(Err(err)) => {
				let reason = unknown_reason(&err);
				if reason == UnknownReason::Fault {
					warn!(
						signal = %self.model.qualified_name(task.target),
						cluster = task.cluster,
						%err,
						"algebraic verification failed"
					);
				} else {
					debug!(
						signal = %self.model.qualified_name(task.target),
						%err,
						"algebraic verification interrupted"
					);
				}
				Verdict::Unknown(reason)
			}
			Err(_) => {
				warn!(
					signal = %self.model.qualified_name(task.target),
					cluster = task.cluster,
					n_constraints = task.closure.len(),
					"algebraic verification panicked"
				);
				Verdict::Unknown(UnknownReason::Fault)
			}
		};
		let stage = if verdict.is_unknown() {
			TaskStage::Escalated
		} else {
			TaskStage::Resolved
		};
		Resolution {
			verdict,
			stage,
			resolved_by: ResolvedBy::Algebra,
		}
	}
}

/// Verifies `model` with a fresh context.
pub fn verify(
	model: &ConstraintModel,
	config: VerifierConfig,
) -> Result<VerificationReport, Error> {
	VerificationContext::new(model, config)?.run()
}
