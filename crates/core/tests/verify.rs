// Copyright 2024-2025 Irreducible Inc.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use safecirc_core::{
	decompose::DecompositionStrategy,
	report::{ResolvedBy, TaskStage},
	verdict::{HeuristicRule, SafeEvidence},
	verify, CircuitVerdict, ConstraintModel, SignalId, UnknownReason, Verdict, VerificationContext,
	VerifierConfig,
};
use safecirc_field::PrimeField;
use safecirc_math::{Budget, CancellationToken};

use crate::common::assert_witnesses_check_out;

fn config() -> VerifierConfig {
	safecirc_utils::tracing::init_tracing();
	VerifierConfig::default().with_num_threads(2)
}

/// `out <== 1 - in * inv` and `in * out === 0`, with `inv` left unconstrained otherwise.
fn is_zero() -> (ConstraintModel, [SignalId; 3]) {
	let mut model = ConstraintModel::default();
	let input = model.add_input("in");
	let inv = model.add_intermediate("inv");
	let out = model.add_output("out");
	model.assign(out, -(input * inv) + 1).unwrap();
	model.constrain(input * out).unwrap();
	(model, [input, inv, out])
}

#[test]
fn test_linear_assignment_is_safe() {
	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	let y = model.add_output("y");
	model.constrain(y - x).unwrap();

	let report = verify(&model, config()).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Safe);
	let task = report.task(y).unwrap();
	assert_eq!(task.verdict, Verdict::Safe(SafeEvidence::Heuristic(HeuristicRule::LinearSystem)));
	assert_eq!(task.resolved_by, ResolvedBy::Heuristic(HeuristicRule::LinearSystem));
	assert_eq!(task.parameters, vec![x]);
	assert_eq!(report.stats.escalated, 0);
}

#[test]
fn test_unconstrained_output_is_unsafe() {
	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	let y = model.add_output("y");
	model.constrain(x * x - 4).unwrap();

	let report = verify(&model, config()).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Unsafe);
	let task = report.task(y).unwrap();
	assert_eq!(task.resolved_by, ResolvedBy::Heuristic(HeuristicRule::FreeSignal));
	assert!(task.closure.is_empty());
	assert!(!task.widened);
	let pair = assert_matches!(&task.verdict, Verdict::Unsafe(pair) => pair);
	assert_eq!(pair.differing_signals().collect::<Vec<_>>(), vec![y]);
	// The input is completed from a root of its own constraint.
	assert_eq!(pair.first[&x], pair.second[&x]);
	assert_eq!(model.field().square(&pair.first[&x]), model.field().from_u64(4));
	assert_witnesses_check_out(&model, &report);
}

#[test]
fn test_undisambiguated_boolean_is_unsafe() {
	let mut model = ConstraintModel::default();
	model.add_input("x");
	let b = model.add_output("b");
	model.constrain(b * (b - 1)).unwrap();

	let report = verify(&model, config()).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Unsafe);
	let task = report.task(b).unwrap();
	assert_eq!(task.resolved_by, ResolvedBy::Algebra);
	assert_eq!(task.stage, TaskStage::Resolved);
	assert_eq!(report.stats.escalated, 1);

	let pair = assert_matches!(&task.verdict, Verdict::Unsafe(pair) => pair);
	let mut values = [pair.first[&b].clone(), pair.second[&b].clone()];
	values.sort();
	assert!(values[0].is_zero() && values[1].is_one());
	assert_witnesses_check_out(&model, &report);
}

#[test]
fn test_zero_budget_is_unknown() {
	let mut model = ConstraintModel::default();
	let b = model.add_output("b");
	model.constrain(b * (b - 1)).unwrap();

	let report = verify(&model, config().with_budget(Budget::zero())).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Unknown);
	assert_matches!(
		report.task(b).unwrap().verdict,
		Verdict::Unknown(UnknownReason::ResourceLimit | UnknownReason::Timeout)
	);
	assert_eq!(report.task(b).unwrap().stage, TaskStage::Escalated);
}

#[test]
fn test_zero_budget_never_blocks_heuristics() {
	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	let y = model.add_output("y");
	model.assign(y, x * x + 3).unwrap();

	let report = verify(&model, config().with_budget(Budget::zero())).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Safe);
	assert_eq!(
		report.task(y).unwrap().resolved_by,
		ResolvedBy::Heuristic(HeuristicRule::DirectAssignment)
	);
}

#[test]
fn test_inverse_is_safe_by_algebra() {
	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	let y = model.add_output("y");
	model.constrain(x * y - 1).unwrap();

	let report = verify(&model, config()).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Safe);
	assert_matches!(
		report.task(y).unwrap().verdict,
		Verdict::Safe(SafeEvidence::Algebraic(_))
	);
	assert_eq!(report.stats.resolved_by_algebra, 1);
}

#[test]
fn test_algebra_disabled() {
	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	let y = model.add_output("y");
	model.constrain(x * y - 1).unwrap();

	let report = verify(&model, config().with_algebraic_fallback(false)).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Unknown);
	let task = report.task(y).unwrap();
	assert_eq!(task.verdict, Verdict::Unknown(UnknownReason::NoApplicableRule));
	assert_eq!(task.stage, TaskStage::HeuristicChecked);
}

#[test]
fn test_is_zero() {
	let (model, [input, inv, out]) = is_zero();

	let report = verify(&model, config().exhaustive()).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Unsafe);
	assert!(report.task(out).unwrap().verdict.is_safe());
	let pair = assert_matches!(&report.task(inv).unwrap().verdict, Verdict::Unsafe(pair) => pair);
	// The inverse is only free when the input is zero.
	assert!(pair.first[&input].is_zero());
	assert_witnesses_check_out(&model, &report);

	// The closure of `inv` misses `in * out === 0`, which only the widened task sees.
	let task = report.task(inv).unwrap();
	assert!(task.widened);
	assert_eq!(task.closure.len(), 2);
	assert_eq!(report.stats.widened, 1);
}

/// `z <== y; z === x`: the closure of `y` alone admits two values of `y`, but the whole
/// circuit pins `y` to the input.
#[test]
fn test_local_counter_example_must_extend_to_the_whole_model() {
	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	let y = model.add_intermediate("y");
	let z = model.add_output("z");
	model.assign(z, y).unwrap();
	model.constrain(z - x).unwrap();

	for strategy in [DecompositionStrategy::Modular, DecompositionStrategy::Monolithic] {
		let report = verify(&model, config().exhaustive().with_strategy(strategy)).unwrap();
		assert_eq!(report.verdict, CircuitVerdict::Safe, "{strategy:?}");
		assert!(report.task(y).unwrap().verdict.is_safe(), "{strategy:?}");
		assert!(report.task(z).unwrap().verdict.is_safe(), "{strategy:?}");
	}

	let report = verify(&model, config().exhaustive()).unwrap();
	let task = report.task(y).unwrap();
	assert!(task.widened);
	assert_eq!(task.resolved_by, ResolvedBy::Heuristic(HeuristicRule::LinearSystem));
	assert_eq!(task.parameters, vec![x]);
}

#[test]
fn test_inconsistent_model_is_safe() {
	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	let b = model.add_output("b");
	model.constrain(b * (b - 1)).unwrap();
	// x^2 = x and x^2 = x + 1 have no common root.
	model.constrain(x * x - x).unwrap();
	model.constrain(x * x - x - 1).unwrap();

	let report = verify(&model, config()).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Safe);
	assert_eq!(report.task(b).unwrap().verdict, Verdict::Safe(SafeEvidence::NoAssignment));
}

#[test]
fn test_short_circuit_skips_later_levels() {
	let (model, [_, inv, out]) = is_zero();

	let report = verify(&model, config()).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Unsafe);
	assert!(report.task(inv).unwrap().verdict.is_unsafe());
	let skipped = report.task(out).unwrap();
	assert_eq!(skipped.verdict, Verdict::Unknown(UnknownReason::Skipped));
	assert_eq!(skipped.stage, TaskStage::Pending);
	assert_eq!(report.stats.skipped, 1);
}

#[test]
fn test_safe_targets_become_parameters() {
	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	let a = model.add_intermediate("a");
	let b = model.add_intermediate("b");
	let out = model.add_output("out");
	model.assign(a, x * x).unwrap();
	model.assign(b, a + 1).unwrap();
	model.assign(out, b * x).unwrap();

	let report = verify(&model, config()).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Safe);
	assert_eq!(report.stats.n_levels, 3);
	assert_eq!(report.task(out).unwrap().parameters, vec![x, b]);
	assert!(report
		.tasks
		.iter()
		.all(|task| matches!(task.resolved_by, ResolvedBy::Heuristic(_))));
}

#[test]
fn test_bit_decomposition_is_safe() {
	let mut model = ConstraintModel::default();
	let input = model.add_input("in");
	let bits = (0..4)
		.map(|i| model.add_output(format!("out[{i}]")))
		.collect::<Vec<_>>();
	let mut sum = safecirc_core::Expr::constant(0);
	for (i, &bit) in bits.iter().enumerate() {
		model.constrain(bit * (bit - 1)).unwrap();
		sum = sum + bit * (1i64 << i);
	}
	model.constrain(sum - input).unwrap();

	let report = verify(&model, config()).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Safe);
	assert_eq!(report.stats.n_clusters, 1);
	assert_eq!(
		report.task(bits[0]).unwrap().resolved_by,
		ResolvedBy::Heuristic(HeuristicRule::BooleanDecomposition)
	);
	assert_eq!(report.stats.escalated, 0);
}

#[test]
fn test_cache_shares_identical_instances() {
	let mut model = ConstraintModel::default();
	let outputs = (0..3)
		.map(|i| {
			let x = model.add_input(format!("x{i}"));
			let y = model.add_output(format!("y{i}"));
			model.constrain(x * y - 1).unwrap();
			y
		})
		.collect::<Vec<_>>();

	let context = VerificationContext::new(&model, config()).unwrap();
	let report = context.run().unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Safe);
	assert_eq!(report.stats.cache_misses, 1);
	assert_eq!(report.stats.cache_hits, 2);
	assert_eq!(report.tasks.iter().filter(|task| task.cache_hit).count(), 2);

	let again = context.run().unwrap();
	assert_eq!(again.stats.cache_hits, 3);
	assert_eq!(again.stats.cache_misses, 0);

	let uncached = verify(&model, config().with_caching(false)).unwrap();
	assert_eq!(uncached.stats.cache_hits, 0);
	for &y in &outputs {
		assert_eq!(report.task(y).unwrap().verdict, uncached.task(y).unwrap().verdict);
	}
}

#[test]
fn test_timeouts_are_not_cached() {
	let mut model = ConstraintModel::default();
	let b = model.add_output("b");
	model.constrain(b * (b - 1)).unwrap();

	let budget = Budget::unlimited().with_timeout(Duration::ZERO);
	let context = VerificationContext::new(&model, config().with_budget(budget)).unwrap();
	for _ in 0..2 {
		let report = context.run().unwrap();
		let task = report.task(b).unwrap();
		assert_eq!(task.verdict, Verdict::Unknown(UnknownReason::Timeout));
		assert!(!task.cache_hit);
		assert_eq!(report.stats.cache_misses, 1);
	}
	assert!(context.cache().is_empty());
}

#[test]
fn test_cancelled_run() {
	let (model, [_, inv, out]) = is_zero();
	let token = CancellationToken::new();
	token.cancel();

	let context = VerificationContext::new(&model, config())
		.unwrap()
		.with_cancellation(token);
	let report = context.run().unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Unknown);
	for target in [inv, out] {
		let verdict = &report.task(target).unwrap().verdict;
		assert_eq!(*verdict, Verdict::Unknown(UnknownReason::Cancelled));
	}
	assert!(context.cache().is_empty());
}

#[test]
fn test_expected_prime_mismatch() {
	let model = ConstraintModel::new(PrimeField::new(101u32.into()).unwrap());
	let config = config().with_expected_prime(PrimeField::bn254().modulus().clone());
	assert_matches!(
		VerificationContext::new(&model, config),
		Err(safecirc_core::Error::Structural(safecirc_core::StructuralError::FieldMismatch { .. }))
	);
}

#[test]
fn test_monolithic_strategy() {
	let (model, _) = is_zero();
	let report = verify(
		&model,
		config()
			.exhaustive()
			.with_strategy(DecompositionStrategy::Monolithic),
	)
	.unwrap();
	assert_eq!(report.stats.n_clusters, 1);
	assert_eq!(report.verdict, CircuitVerdict::Unsafe);
	assert_witnesses_check_out(&model, &report);
}

#[test]
fn test_empty_model_is_safe() {
	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	model.constrain(x * x - x).unwrap();
	let report = verify(&model, config()).unwrap();
	assert_eq!(report.verdict, CircuitVerdict::Safe);
	assert!(report.tasks.is_empty());
}
