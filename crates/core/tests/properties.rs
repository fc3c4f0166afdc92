// Copyright 2024-2025 Irreducible Inc.

mod common;

use std::time::Duration;

use num_bigint::BigUint;
use proptest::prelude::*;
use safecirc_core::{
	algebraic::AlgebraicVerifier,
	decompose::DecompositionStrategy,
	heuristics::{self, RuleSet},
	task::{LocalRole, LocalSystem},
	verdict::HeuristicRule,
	verify, CircuitVerdict, ConstraintModel, Expr, Verdict, VerifierConfig,
};
use safecirc_field::PrimeField;
use safecirc_math::{Budget, CancellationToken, SparseMonomial, SparsePolynomial};

use crate::common::assert_witnesses_check_out;

const N_UNKNOWNS: usize = 3;
const N_PARAMETERS: usize = 2;

fn field() -> PrimeField {
	PrimeField::new(BigUint::from(101u32)).unwrap()
}

fn monomial() -> impl Strategy<Value = Vec<(usize, u32)>> {
	let n = N_UNKNOWNS + N_PARAMETERS;
	prop_oneof![
		Just(Vec::new()),
		(0..n).prop_map(|var| vec![(var, 1)]),
		(0..n).prop_map(|var| vec![(var, 2)]),
		(0..n, 0..n)
			.prop_filter("distinct variables", |(a, b)| a < b)
			.prop_map(|(a, b)| vec![(a, 1), (b, 1)]),
	]
}

fn polynomial() -> impl Strategy<Value = Vec<(Vec<(usize, u32)>, i64)>> {
	prop::collection::vec((monomial(), -3i64..=3), 1..=3)
}

/// A local system over three unknowns (the target first) and two parameters.
fn local_system() -> impl Strategy<Value = LocalSystem> {
	prop::collection::vec(polynomial(), 1..=3).prop_map(|polys| {
		let field = field();
		let mut roles = vec![LocalRole::Unknown; N_UNKNOWNS];
		roles.extend([LocalRole::Parameter; N_PARAMETERS]);
		let constraints = polys
			.into_iter()
			.map(|terms| {
				SparsePolynomial::from_terms(
					&field,
					terms.into_iter().map(|(factors, coeff)| {
						(SparseMonomial::from(factors), field.from_i64(coeff))
					}),
				)
			})
			.collect();
		LocalSystem::new(roles, constraints)
	})
}

/// How an unknown signal of a random circuit is computed from earlier signals. Operand indices
/// are reduced modulo the number of earlier signals.
#[derive(Debug, Clone)]
enum Assignment {
	Product(usize, usize),
	Sum(usize, usize, i64),
	Square(usize),
	/// Constrained by the extra constraints only.
	Unassigned,
}

fn assignment() -> impl Strategy<Value = Assignment> {
	prop_oneof![
		(0..8usize, 0..8usize).prop_map(|(a, b)| Assignment::Product(a, b)),
		(0..8usize, 0..8usize, -2i64..=2).prop_map(|(a, b, c)| Assignment::Sum(a, b, c)),
		(0..8usize).prop_map(Assignment::Square),
		Just(Assignment::Unassigned),
	]
}

/// Inputs, a chain of `<==` assignments over earlier signals, and a few extra `===`
/// constraints over any signals.
fn circuit() -> impl Strategy<Value = ConstraintModel> {
	(
		1..=2usize,
		prop::collection::vec(assignment(), 2..=4),
		prop::collection::vec(polynomial(), 0..=2),
	)
		.prop_map(|(n_inputs, assignments, extra)| {
			let mut model = ConstraintModel::new(field());
			let mut signals = (0..n_inputs)
				.map(|i| model.add_input(format!("in{i}")))
				.collect::<Vec<_>>();
			let n_unknowns = assignments.len();
			for (i, assignment) in assignments.into_iter().enumerate() {
				let signal = if i + 1 == n_unknowns {
					model.add_output("out")
				} else {
					model.add_intermediate(format!("s{i}"))
				};
				let earlier = |index: usize| signals[index % signals.len()];
				let expr = match assignment {
					Assignment::Product(a, b) => Some(earlier(a) * earlier(b)),
					Assignment::Sum(a, b, c) => Some(earlier(a) + earlier(b) * c),
					Assignment::Square(a) => Some(earlier(a) * earlier(a)),
					Assignment::Unassigned => None,
				};
				if let Some(expr) = expr {
					model.assign(signal, expr).unwrap();
				}
				signals.push(signal);
			}
			for terms in extra {
				let poly = terms
					.into_iter()
					.map(|(factors, coeff)| {
						factors.into_iter().fold(Expr::constant(coeff), |acc, (var, exp)| {
							(0..exp).fold(acc, |acc, _| acc * signals[var % signals.len()])
						})
					})
					.fold(Expr::constant(0), |acc, term| acc + term);
				model.constrain(poly).unwrap();
			}
			model
		})
}

fn algebra() -> AlgebraicVerifier {
	AlgebraicVerifier::new(Budget::default().with_timeout(Duration::from_secs(1)))
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(32))]

	/// The heuristic rules never contradict the complete algebraic procedure.
	#[test]
	fn test_heuristics_agree_with_algebra(local in local_system()) {
		let field = field();
		let Some((rule, verdict)) = heuristics::check(&local, &field, RuleSet::all()) else {
			return Ok(());
		};
		if let Verdict::Unsafe(pair) = &verdict {
			prop_assert!(local.check_witness_pair(&field, pair), "{rule} built an invalid witness");
		}
		let Ok(exact) = algebra().verify(&local, &field, &CancellationToken::new()) else {
			return Ok(());
		};
		match (&verdict, &exact) {
			(Verdict::Safe(_), Verdict::Unsafe(_)) => {
				prop_assert!(false, "{rule} claimed safety of a system with two solutions")
			}
			(Verdict::Unsafe(_), Verdict::Safe(_)) => {
				prop_assert!(false, "{rule} produced a witness for a safe system")
			}
			_ => {}
		}
	}

	/// Every witness reported by the algebraic verifier is a genuine counter-example.
	#[test]
	fn test_algebraic_witnesses_check_out(local in local_system()) {
		let field = field();
		let verdict = algebra().verify(&local, &field, &CancellationToken::new());
		if let Ok(Verdict::Unsafe(pair)) = verdict {
			prop_assert!(local.check_witness_pair(&field, &pair));
		}
	}

	/// Disabling rules never turns a verdict into its opposite.
	#[test]
	fn test_rule_subsets_are_consistent(local in local_system(), mask in 0usize..16) {
		let field = field();
		let rules = HeuristicRule::ALL
			.into_iter()
			.enumerate()
			.filter(|(i, _)| mask & (1 << i) != 0)
			.map(|(_, rule)| rule)
			.collect::<RuleSet>();
		let all = heuristics::check(&local, &field, RuleSet::all()).map(|(_, v)| v.kind());
		let some = heuristics::check(&local, &field, rules).map(|(_, v)| v.kind());
		if let (Some(all), Some(some)) = (all, some) {
			prop_assert_eq!(all, some);
		}
	}
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(24))]

	/// Modular and monolithic verification never reach opposite definite verdicts, and every
	/// counter-example satisfies the whole circuit.
	#[test]
	fn test_decomposition_agrees_on_random_circuits(model in circuit()) {
		let config = VerifierConfig::default()
			.exhaustive()
			.with_num_threads(1)
			.with_budget(Budget::default().with_timeout(Duration::from_millis(500)));
		let modular = verify(&model, config.clone()).unwrap();
		let monolithic =
			verify(&model, config.with_strategy(DecompositionStrategy::Monolithic)).unwrap();

		for task in &modular.tasks {
			let other = monolithic.task(task.target).unwrap();
			if !task.verdict.is_unknown() && !other.verdict.is_unknown() {
				prop_assert_eq!(task.verdict.kind(), other.verdict.kind(), "{}", task.name);
			}
		}
		let definite = [modular.verdict, monolithic.verdict]
			.into_iter()
			.all(|verdict| verdict != CircuitVerdict::Unknown);
		if definite {
			prop_assert_eq!(modular.verdict, monolithic.verdict);
		}
		assert_witnesses_check_out(&model, &modular);
		assert_witnesses_check_out(&model, &monolithic);
	}
}

/// Small circuits whose verdicts do not depend on how they are decomposed.
fn corpus() -> Vec<(&'static str, ConstraintModel)> {
	let mut circuits = Vec::new();

	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	let y = model.add_output("y");
	model.constrain(y - x).unwrap();
	circuits.push(("copy", model));

	let mut model = ConstraintModel::default();
	let b = model.add_output("b");
	model.constrain(b * (b - 1)).unwrap();
	circuits.push(("boolean", model));

	let mut model = ConstraintModel::default();
	let input = model.add_input("in");
	let inv = model.add_intermediate("inv");
	let out = model.add_output("out");
	model.assign(out, -(input * inv) + 1).unwrap();
	model.constrain(input * out).unwrap();
	circuits.push(("is_zero", model));

	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	let a = model.add_intermediate("a");
	let b = model.add_intermediate("b");
	let out = model.add_output("out");
	model.assign(a, x * x).unwrap();
	model.assign(b, a + 1).unwrap();
	model.assign(out, b * x).unwrap();
	circuits.push(("chain", model));

	let mut model = ConstraintModel::default();
	let input = model.add_input("in");
	let b0 = model.add_output("b0");
	let b1 = model.add_output("b1");
	model.constrain(b0 * (b0 - 1)).unwrap();
	model.constrain(b1 * (b1 - 1)).unwrap();
	model.constrain(Expr::from(b0) + b1 * 2 - input).unwrap();
	circuits.push(("num2bits", model));

	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	let y = model.add_output("y");
	model.constrain(x * y - 1).unwrap();
	circuits.push(("inverse", model));

	circuits
}

#[test]
fn test_decomposition_is_monotone() {
	for (name, model) in corpus() {
		let config = VerifierConfig::default().exhaustive().with_num_threads(2);
		let modular = verify(&model, config.clone()).unwrap();
		let monolithic =
			verify(&model, config.with_strategy(DecompositionStrategy::Monolithic)).unwrap();
		assert_eq!(modular.verdict, monolithic.verdict, "{name}");
		assert_ne!(modular.verdict, CircuitVerdict::Unknown, "{name}");
	}
}

#[test]
fn test_unsafe_iff_witness() {
	for (name, model) in corpus() {
		let report = verify(&model, VerifierConfig::default().exhaustive()).unwrap();
		let has_witness = report.tasks.iter().any(|task| match &task.verdict {
			Verdict::Unsafe(pair) => pair.differing_signals().any(|signal| signal == task.target),
			_ => false,
		});
		assert_eq!(report.verdict == CircuitVerdict::Unsafe, has_witness, "{name}");
		assert_witnesses_check_out(&model, &report);
	}
}
