// Copyright 2025 Irreducible Inc.

use assert_matches::assert_matches;
use num_bigint::BigUint;
use safecirc_field::PrimeField;
use safecirc_math::SparsePolynomial;

use super::*;

fn small_field() -> PrimeField {
	PrimeField::new(BigUint::from(97u32)).unwrap()
}

#[test]
fn test_builder_assigns_dense_ids() {
	let mut model = ConstraintModel::new(small_field());
	let x = model.add_input("x");
	let y = model.add_output("y");
	let z = model.add_intermediate("z");
	assert_eq!((x.index(), y.index(), z.index()), (0, 1, 2));

	let c0 = model.assign(z, x * x).unwrap().unwrap();
	let c1 = model.constrain(y - z - 1).unwrap().unwrap();
	assert_eq!((c0.index(), c1.index()), (0, 1));
	assert_eq!(model.constraint(c0).assigns(), Some(z));
	assert_eq!(model.constraint(c0).degree(), 2);
	assert_eq!(model.constraint(c1).variables().collect::<Vec<_>>(), vec![y, z]);
	assert_eq!(model.qualified_name(y), "main.y");
	assert!(model.validate().is_ok());
}

#[test]
fn test_zero_constraints_are_dropped() {
	let mut model = ConstraintModel::new(small_field());
	let x = model.add_input("x");
	assert_eq!(model.constrain(x - x).unwrap(), None);
	// 97 reduces to zero.
	assert_eq!(model.constrain(Expr::constant(97)).unwrap(), None);
	assert_eq!(model.n_constraints(), 0);
}

#[test]
fn test_assignment_provenance_is_checked() {
	let mut model = ConstraintModel::new(small_field());
	let x = model.add_input("x");
	let y = model.add_output("y");
	assert_matches!(
		model.assign(x, y + 1),
		Err(StructuralError::AssignedParameter { signal }) if signal == x
	);

	let poly = (Expr::from(x) + 3).to_polynomial(&small_field());
	assert_matches!(
		model.add_constraint(poly, Some(y), model.root_scope()),
		Err(StructuralError::AssignedSignalAbsent { .. })
	);
}

#[test]
fn test_dangling_references() {
	let mut model = ConstraintModel::new(small_field());
	model.add_input("x");
	assert_matches!(
		model.add_constraint(SparsePolynomial::var(5), None, model.root_scope()),
		Err(StructuralError::DanglingSignal {
			signal: 5,
			n_signals: 1,
			..
		})
	);
	assert_matches!(
		model.add_signal("y", SignalRole::Output, ScopeId::from_index(3)),
		Err(StructuralError::DanglingScope { scope: 3, .. })
	);
}

#[test]
fn test_r1cs_requires_linear_factors() {
	let mut model = ConstraintModel::new(small_field());
	let a = model.add_input("a");
	let b = model.add_output("b");
	let root = model.root_scope();
	assert!(model.add_r1cs(a + 1, b, a, Some(b), root).unwrap().is_some());
	assert_matches!(
		model.add_r1cs(a * a, b, 0, None, root),
		Err(StructuralError::NonLinearFactor { factor: 'A' })
	);
}

#[test]
fn test_scopes() {
	let mut model = ConstraintModel::new(small_field());
	let root = model.root_scope();
	let c0 = model.add_scope("c[0]", "Num2Bits", root).unwrap();
	let inner = model.add_scope("inv", "IsZero", c0).unwrap();
	let s = model
		.add_signal("out", SignalRole::Intermediate, inner)
		.unwrap();
	assert_eq!(model.qualified_name(s), "main.c[0].inv.out");
	assert_eq!(model.find_signal("main.c[0].inv.out"), Some(s));
	assert_eq!(model.find_signal("main.out"), None);
}

#[test]
fn test_cyclic_scopes_are_rejected() {
	let mut model = ConstraintModel::new(small_field());
	let root = model.root_scope();
	let a = model.add_scope("a", "A", root).unwrap();
	let b = model.add_scope("b", "B", a).unwrap();
	model.scopes[a.index()].parent = Some(b);
	assert_matches!(model.validate(), Err(StructuralError::CyclicScope { .. }));
}

#[test]
fn test_validate_witness() {
	let field = small_field();
	let mut model = ConstraintModel::new(field.clone());
	let x = model.add_input("x");
	let y = model.add_output("y");
	model.assign(y, x * x + 1).unwrap();
	model.constrain(y - 10).unwrap();

	let witness = vec![field.from_u64(3), field.from_u64(10)];
	assert!(model.validate_witness(&witness).unwrap().is_empty());

	let witness = vec![field.from_u64(2), field.from_u64(5)];
	assert_eq!(model.validate_witness(&witness).unwrap(), vec![ConstraintId::from_index(1)]);

	assert_matches!(
		model.validate_witness(&witness[..1]),
		Err(StructuralError::WitnessLength {
			expected: 2,
			got: 1
		})
	);
}

#[test]
fn test_dependency_graph() {
	let mut model = ConstraintModel::new(small_field());
	let x = model.add_input("x");
	let y = model.add_output("y");
	let z = model.add_intermediate("z");
	let w = model.add_intermediate("w");
	let c0 = model.assign(z, x + 1).unwrap().unwrap();
	let c1 = model.constrain(y * z - x).unwrap().unwrap();

	let graph = DependencyGraph::new(&model);
	assert!(graph.validate(&model).is_ok());
	assert_eq!(graph.constraints_of(x), &[c0, c1]);
	assert_eq!(graph.signals_of(c1), &[x, y, z]);
	assert!(graph.constraints_of(w).is_empty());
	assert_eq!(graph.closure([y]), vec![c1]);
	assert_eq!(graph.closure([z, y]), vec![c0, c1]);
	assert!(graph.closure([w]).is_empty());

	// A graph of another model must not validate against this one.
	model.add_intermediate("v");
	assert_matches!(graph.validate(&model), Err(StructuralError::GraphSize { .. }));
}

#[test]
fn test_components() {
	let mut model = ConstraintModel::new(small_field());
	let a = model.add_input("a");
	let b = model.add_input("b");
	let y = model.add_output("y");
	let free = model.add_intermediate("free");
	let z = model.add_intermediate("z");
	let c0 = model.assign(z, b * b).unwrap().unwrap();
	let c1 = model.constrain(a - 2).unwrap().unwrap();
	let c2 = model.assign(y, z + 1).unwrap().unwrap();
	let c3 = model.constrain(Expr::constant(5)).unwrap().unwrap();

	let components = DependencyGraph::new(&model).components();
	assert_eq!(components.len(), 3);
	assert_eq!(components.signals(0), &[a]);
	assert_eq!(components.constraints(0), &[c1]);
	assert_eq!(components.signals(1), &[b, y, z]);
	assert_eq!(components.constraints(1), &[c0, c2]);
	assert_eq!(components.signals(2), &[free]);
	assert!(components.constraints(2).is_empty());
	assert_eq!(components.component_of(z), components.component_of(b));
	assert_eq!(components.position_of(z), 2);
	assert_eq!(components.constant_constraints(), &[c3]);
}

#[test]
fn test_serde_round_trip() {
	let mut model = ConstraintModel::default();
	let x = model.add_input("x");
	let y = model.add_output("y");
	model.assign(y, x * x - 3).unwrap();

	let json = serde_json::to_string(&model).unwrap();
	let decoded: ConstraintModel = serde_json::from_str(&json).unwrap();
	assert_eq!(decoded, model);
}

#[test]
fn test_deserialization_validates() {
	let json = r#"{
		"prime": "97",
		"scopes": [{"name": "main", "template": "main", "parent": null}],
		"signals": [{"name": "x", "role": "Input", "scope": 0}],
		"constraints": [{"poly": [[[[4, 1]], "1"]], "assigns": null, "scope": 0}]
	}"#;
	assert!(serde_json::from_str::<ConstraintModel>(json).is_err());

	let json = r#"{
		"prime": "91",
		"scopes": [{"name": "main", "template": "main", "parent": null}],
		"signals": [],
		"constraints": []
	}"#;
	assert!(serde_json::from_str::<ConstraintModel>(json).is_err());
}
