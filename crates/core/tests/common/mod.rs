// Copyright 2025 Irreducible Inc.

//! Checks shared by the integration tests.

use std::collections::BTreeMap;

use safecirc_core::{report::VerificationReport, ConstraintModel, SignalId, Verdict};
use safecirc_field::Fp;

/// Every unsafe task carries two assignments of every signal of the model. Both satisfy every
/// constraint, they agree on every input and fixed signal, and they differ on the target.
pub fn assert_witnesses_check_out(model: &ConstraintModel, report: &VerificationReport) {
	for task in report.unsafe_tasks() {
		let Verdict::Unsafe(pair) = &task.verdict else {
			unreachable!()
		};
		let first = full_assignment(model, &pair.first);
		let second = full_assignment(model, &pair.second);
		for witness in [&first, &second] {
			let violated = model.validate_witness(witness).unwrap();
			assert!(violated.is_empty(), "{} violates {violated:?}", task.name);
		}
		for (id, signal) in model.signals() {
			if signal.role.is_parameter() {
				assert_eq!(first[id.index()], second[id.index()], "{}", task.name);
			}
		}
		assert_ne!(first[task.target.index()], second[task.target.index()], "{}", task.name);
	}
}

fn full_assignment(model: &ConstraintModel, values: &BTreeMap<SignalId, Fp>) -> Vec<Fp> {
	assert_eq!(values.len(), model.n_signals());
	model
		.signals()
		.map(|(id, _)| values[&id].clone())
		.collect()
}
