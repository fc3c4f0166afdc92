// Copyright 2024-2025 Irreducible Inc.

//! Loading of the JSON artifacts written by the Circom compiler.
//!
//! Three artifacts describe a compiled circuit:
//!
//! * `constraints.json`, the R1CS list `{"constraints": [[A, B, C], ...]}` where each linear
//!   combination maps a wire index to a decimal coefficient and the constraint is `A * B - C = 0`
//! * the component tree, recording for every component instance its signal and constraint
//!   ranges and which constraints were written with `<==`
//! * optionally the `.sym` table with lines `wire,witness_index,component,qualified_name`
//!
//! Wire 0 is the constant one; wire `i > 0` becomes signal `i - 1` of the model. Wire indices
//! are bounded by [`MAX_WIRES`].

use std::collections::{BTreeMap, HashMap};

use num_bigint::BigInt;
use safecirc_field::{Fp, PrimeField};
use safecirc_math::{SparseMonomial, SparsePolynomial};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::{error::StructuralError, ConstraintModel, ScopeId, SignalId, SignalRole};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
	#[error("malformed JSON: {0}")]
	Json(#[from] serde_json::Error),

	#[error("invalid wire index '{literal}'")]
	InvalidWire { literal: String },

	#[error("wire {wire} is out of range, at most {limit} wires are supported")]
	WireOutOfRange { wire: usize, limit: usize },

	#[error("component tree node {node} has an out-of-range signal or constraint range")]
	InvalidTree { node: usize },

	#[error("invalid coefficient '{literal}'")]
	InvalidCoefficient { literal: String },

	#[error("line {line} of the symbol table does not have four comma-separated entries")]
	MalformedSymbol { line: usize },

	#[error("the witness has no value for wire {wire}")]
	MissingWitnessValue { wire: usize },

	#[error("wire 0 must hold the constant one")]
	ConstantWire,

	#[error("field error: {0}")]
	Field(#[from] safecirc_field::Error),

	#[error("structural error: {0}")]
	Structural(#[from] StructuralError),
}

/// Largest number of wires, the constant included, an import accepts.
pub const MAX_WIRES: usize = 1 << 26;

/// A linear combination over wires, keyed by the decimal wire index.
type LinearCombination = BTreeMap<String, String>;

#[derive(Debug, Deserialize)]
struct ConstraintList {
	constraints: Vec<(LinearCombination, LinearCombination, LinearCombination)>,
}

/// A node of the component tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConstraints {
	/// The prime, in decimal.
	pub field: String,
	pub no_constraints: usize,
	pub initial_constraint: usize,
	pub node_id: usize,
	pub template_name: String,
	pub component_name: String,
	pub number_inputs: usize,
	pub number_outputs: usize,
	pub number_signals: usize,
	/// First wire of the component. Outputs come first, then inputs, then intermediates.
	pub initial_signal: usize,
	/// Pairs of (constraint index, assigned wire) for constraints written with `<==`.
	pub are_double_arrow: Vec<(usize, usize)>,
	pub subcomponents: Vec<TreeConstraints>,
}

impl TreeConstraints {
	fn constraint_range(&self) -> std::ops::Range<usize> {
		self.initial_constraint..self.initial_constraint.saturating_add(self.no_constraints)
	}

	fn signal_range(&self) -> std::ops::Range<usize> {
		self.initial_signal..self.initial_signal.saturating_add(self.number_signals)
	}

	/// One past the largest wire of this node and its descendants.
	///
	/// ## Throws
	///
	/// * [`ImportError::InvalidTree`] if a range overflows or reaches beyond [`MAX_WIRES`]
	fn wire_end(&self) -> Result<usize, ImportError> {
		let invalid = || ImportError::InvalidTree { node: self.node_id };
		let end = self
			.initial_signal
			.checked_add(self.number_signals)
			.filter(|&end| end <= MAX_WIRES)
			.ok_or_else(invalid)?;
		self.initial_constraint
			.checked_add(self.no_constraints)
			.ok_or_else(invalid)?;
		self.subcomponents
			.iter()
			.try_fold(end, |end, child| Ok(end.max(child.wire_end()?)))
	}
}

/// The compiler outputs for one circuit.
#[derive(Debug, Clone, Copy)]
pub struct CircomArtifacts<'a> {
	pub constraints: &'a str,
	pub tree: &'a str,
	pub symbols: Option<&'a str>,
}

fn parse_wire(literal: &str) -> Result<usize, ImportError> {
	let wire = literal
		.trim()
		.parse()
		.map_err(|_| ImportError::InvalidWire {
			literal: literal.to_string(),
		})?;
	if wire >= MAX_WIRES {
		return Err(ImportError::WireOutOfRange {
			wire,
			limit: MAX_WIRES,
		});
	}
	Ok(wire)
}

fn parse_coefficient(field: &PrimeField, literal: &str) -> Result<Fp, ImportError> {
	literal
		.trim()
		.parse::<BigInt>()
		.map(|value| field.from_bigint(&value))
		.map_err(|_| ImportError::InvalidCoefficient {
			literal: literal.to_string(),
		})
}

/// Parses the `.sym` table into a map from wire to qualified name.
pub fn parse_symbols(symbols: &str) -> Result<BTreeMap<usize, String>, ImportError> {
	let mut names = BTreeMap::new();
	for (line_index, line) in symbols.lines().enumerate() {
		if line.trim().is_empty() {
			continue;
		}
		let fields = line.split(',').collect::<Vec<_>>();
		let [wire, _, _, name] = fields[..] else {
			return Err(ImportError::MalformedSymbol {
				line: line_index + 1,
			});
		};
		names.insert(parse_wire(wire)?, name.trim().to_string());
	}
	Ok(names)
}

/// Parses a witness file, a JSON object from wire index to decimal value, into an assignment
/// for the signals of `model`.
pub fn parse_witness(model: &ConstraintModel, json: &str) -> Result<Vec<Fp>, ImportError> {
	let raw: BTreeMap<String, String> = serde_json::from_str(json)?;
	let field = model.field();
	let mut values = HashMap::with_capacity(raw.len());
	for (wire, value) in &raw {
		values.insert(parse_wire(wire)?, parse_coefficient(field, value)?);
	}
	if values.get(&0).is_some_and(|one| !one.is_one()) {
		return Err(ImportError::ConstantWire);
	}
	(1..=model.n_signals())
		.map(|wire| {
			values
				.remove(&wire)
				.ok_or(ImportError::MissingWitnessValue { wire })
		})
		.collect()
}

struct Builder<'a> {
	model: ConstraintModel,
	names: &'a BTreeMap<usize, String>,
	/// Scope owning each wire, or `None` if not covered by the tree.
	wire_scope: Vec<Option<(ScopeId, SignalRole)>>,
	constraint_scope: Vec<ScopeId>,
	assigned_wire: HashMap<usize, usize>,
}

impl Builder<'_> {
	fn visit(&mut self, node: &TreeConstraints, scope: ScopeId, is_main: bool) {
		let outputs = node.initial_signal..node.initial_signal.saturating_add(node.number_outputs);
		let inputs = outputs.end..outputs.end.saturating_add(node.number_inputs);
		for wire in node.signal_range() {
			let role = if !is_main {
				SignalRole::Intermediate
			} else if outputs.contains(&wire) {
				SignalRole::Output
			} else if inputs.contains(&wire) {
				SignalRole::Input
			} else {
				SignalRole::Intermediate
			};
			if let Some(slot) = self.wire_scope.get_mut(wire) {
				*slot = Some((scope, role));
			}
		}
		let constraints = node.constraint_range();
		let end = constraints.end.min(self.constraint_scope.len());
		for slot in self.constraint_scope.get_mut(constraints.start..end).unwrap_or_default() {
			*slot = scope;
		}
		for &(constraint, wire) in &node.are_double_arrow {
			self.assigned_wire.insert(constraint, wire);
		}

		for child in &node.subcomponents {
			let name = if child.component_name.is_empty() {
				format!("node{}", child.node_id)
			} else {
				child.component_name.clone()
			};
			let child_scope = match self.model.add_scope(name, &child.template_name, scope) {
				Ok(child_scope) => child_scope,
				Err(_) => unreachable!("parent scope was created before its children"),
			};
			self.visit(child, child_scope, false);
		}
	}

	fn signal_name(&self, wire: usize) -> String {
		match self.names.get(&wire) {
			Some(qualified) => qualified
				.rsplit_once('.')
				.map_or(qualified.as_str(), |(_, name)| name)
				.to_string(),
			None => format!("w{wire}"),
		}
	}
}

/// Builds a constraint model from compiler artifacts.
///
/// Every wire except the constant becomes a signal. Roles come from the root of the component
/// tree: its outputs and inputs keep their role and every other signal, including the ports
/// of subcomponents, is an intermediate. Constraints listed in `are_double_arrow` record the
/// signal they assign.
#[instrument(skip_all, level = "debug")]
pub fn import(artifacts: CircomArtifacts<'_>) -> Result<ConstraintModel, ImportError> {
	let tree: TreeConstraints = serde_json::from_str(artifacts.tree)?;
	let list: ConstraintList = serde_json::from_str(artifacts.constraints)?;
	let names = match artifacts.symbols {
		Some(symbols) => parse_symbols(symbols)?,
		None => BTreeMap::new(),
	};
	let field = PrimeField::from_decimal(tree.field.trim())?;

	// Parse every linear combination first to learn the number of wires.
	let mut parsed = Vec::with_capacity(list.constraints.len());
	let mut n_wires = tree.wire_end()?.max(1);
	for (a, b, c) in &list.constraints {
		let mut factors = Vec::with_capacity(3);
		for lc in [a, b, c] {
			let mut terms = Vec::with_capacity(lc.len());
			for (wire, coeff) in lc {
				let wire = parse_wire(wire)?;
				n_wires = n_wires.max(wire + 1);
				terms.push((wire, parse_coefficient(&field, coeff)?));
			}
			factors.push(terms);
		}
		parsed.push(factors);
	}
	if let Some(&last) = names.keys().next_back() {
		n_wires = n_wires.max(last + 1);
	}

	let mut builder = Builder {
		model: ConstraintModel::new(field.clone()),
		names: &names,
		wire_scope: vec![None; n_wires],
		constraint_scope: vec![ScopeId::from_index(0); parsed.len()],
		assigned_wire: HashMap::new(),
	};
	let root = builder.model.root_scope();
	builder.model.scopes[root.index()].template = tree.template_name.clone();
	builder.visit(&tree, root, true);

	for wire in 1..n_wires {
		let (scope, role) = builder.wire_scope[wire].unwrap_or((root, SignalRole::Intermediate));
		let name = builder.signal_name(wire);
		builder.model.add_signal(name, role, scope)?;
	}

	let to_poly = |terms: &[(usize, Fp)]| {
		SparsePolynomial::from_terms(
			&field,
			terms.iter().map(|(wire, coeff)| match wire {
				0 => (SparseMonomial::one(), coeff.clone()),
				_ => (SparseMonomial::var(wire - 1), coeff.clone()),
			}),
		)
	};
	for (index, factors) in parsed.iter().enumerate() {
		let poly = to_poly(&factors[0])
			.mul(&to_poly(&factors[1]), &field)
			.sub(&to_poly(&factors[2]), &field);
		let scope = builder.constraint_scope[index];
		let mut assigns = builder
			.assigned_wire
			.get(&index)
			.filter(|&&wire| wire > 0)
			.map(|&wire| SignalId::from_index(wire - 1));
		if let Some(signal) = assigns {
			let usable = builder.model.is_valid_signal(signal)
				&& poly.contains_variable(signal.index())
				&& !builder.model.signal(signal).role.is_parameter();
			if !usable {
				warn!(
					constraint = index,
					%signal,
					"dropping '<==' provenance the constraint cannot carry"
				);
				assigns = None;
			}
		}
		builder.model.add_constraint(poly, assigns, scope)?;
	}

	Ok(builder.model)
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;

	const TREE: &str = r#"{
		"field": "21888242871839275222246405745257275088548364400416034343698204186575808495617",
		"no_constraints": 2,
		"initial_constraint": 0,
		"node_id": 0,
		"template_name": "Main",
		"component_name": "main",
		"number_inputs": 1,
		"number_outputs": 1,
		"number_signals": 2,
		"initial_signal": 1,
		"are_double_arrow": [[1, 3]],
		"subcomponents": [{
			"field": "21888242871839275222246405745257275088548364400416034343698204186575808495617",
			"no_constraints": 1,
			"initial_constraint": 1,
			"node_id": 1,
			"template_name": "Square",
			"component_name": "sq",
			"number_inputs": 1,
			"number_outputs": 1,
			"number_signals": 2,
			"initial_signal": 3,
			"are_double_arrow": [],
			"subcomponents": []
		}]
	}"#;

	// out = sq.out, sq.out <== sq.in * sq.in, where sq.in is wire 4
	const CONSTRAINTS: &str = r#"{"constraints": [
		[{}, {}, {"1": "1", "3": "21888242871839275222246405745257275088548364400416034343698204186575808495616"}],
		[{"4": "1"}, {"4": "1"}, {"3": "1"}]
	]}"#;

	const SYMBOLS: &str = "1,1,0,main.out\n2,2,0,main.in\n3,3,1,main.sq.out\n4,4,1,main.sq.in\n";

	fn artifacts(symbols: Option<&'static str>) -> CircomArtifacts<'static> {
		CircomArtifacts {
			constraints: CONSTRAINTS,
			tree: TREE,
			symbols,
		}
	}

	#[test]
	fn test_import_roles_and_scopes() {
		let model = import(artifacts(Some(SYMBOLS))).unwrap();
		assert_eq!(model.n_signals(), 4);
		assert_eq!(model.n_constraints(), 2);
		assert_eq!(model.signal(SignalId::from_index(0)).role, SignalRole::Output);
		assert_eq!(model.signal(SignalId::from_index(1)).role, SignalRole::Input);
		assert_eq!(model.signal(SignalId::from_index(2)).role, SignalRole::Intermediate);
		assert_eq!(model.qualified_name(SignalId::from_index(3)), "main.sq.in");
		assert_eq!(model.find_signal("main.out"), Some(SignalId::from_index(0)));

		let (_, squaring) = model.constraints().nth(1).unwrap();
		assert_eq!(squaring.degree(), 2);
		assert_eq!(squaring.assigns(), Some(SignalId::from_index(2)));
		assert_eq!(model.scope(squaring.scope()).template, "Square");
	}

	#[test]
	fn test_import_without_symbols() {
		let model = import(artifacts(None)).unwrap();
		assert_eq!(model.signal(SignalId::from_index(0)).name, "w1");
	}

	#[test]
	fn test_witness() {
		let model = import(artifacts(None)).unwrap();
		let witness = parse_witness(&model, r#"{"0": "1", "1": "9", "2": "7", "3": "9", "4": "3"}"#)
			.unwrap();
		assert_eq!(witness.len(), 4);
		assert!(model.validate_witness(&witness).unwrap().is_empty());

		let witness = parse_witness(&model, r#"{"0": "1", "1": "9", "2": "7", "3": "9", "4": "4"}"#)
			.unwrap();
		assert_eq!(model.validate_witness(&witness).unwrap().len(), 1);

		assert_matches!(
			parse_witness(&model, r#"{"0": "1", "1": "9"}"#),
			Err(ImportError::MissingWitnessValue { wire: 2 })
		);
	}

	#[test]
	fn test_malformed_inputs() {
		assert_matches!(parse_symbols("1,1,main.x"), Err(ImportError::MalformedSymbol { line: 1 }));
		let bad = CircomArtifacts {
			constraints: r#"{"constraints": [[{"x": "1"}, {}, {}]]}"#,
			..artifacts(None)
		};
		assert_matches!(import(bad), Err(ImportError::InvalidWire { .. }));
		let bad = CircomArtifacts {
			constraints: "[",
			..artifacts(None)
		};
		assert_matches!(import(bad), Err(ImportError::Json(_)));
	}

	#[test]
	fn test_out_of_range_wires() {
		let huge = CircomArtifacts {
			constraints: r#"{"constraints": [[{"18446744073709551615": "1"}, {}, {}]]}"#,
			..artifacts(None)
		};
		assert_matches!(
			import(huge),
			Err(ImportError::WireOutOfRange {
				limit: MAX_WIRES,
				..
			})
		);

		let symbols = "1,1,0,main.out\n67108864,2,0,main.x\n";
		assert_matches!(
			import(artifacts(Some(symbols))),
			Err(ImportError::WireOutOfRange { wire: 67108864, .. })
		);

		let tree = TREE.replacen(
			r#""number_signals": 2"#,
			r#""number_signals": 18446744073709551615"#,
			1,
		);
		let overflowing = CircomArtifacts {
			tree: &tree,
			..artifacts(None)
		};
		assert_matches!(import(overflowing), Err(ImportError::InvalidTree { node: 0 }));
	}

	#[test]
	fn test_constraint_ranges_beyond_the_list_are_clamped() {
		let tree = TREE.replacen(
			r#""no_constraints": 2"#,
			r#""no_constraints": 18446744073709551615"#,
			1,
		);
		let model = import(CircomArtifacts {
			tree: &tree,
			..artifacts(None)
		})
		.unwrap();
		assert_eq!(model.n_constraints(), 2);
	}
}
