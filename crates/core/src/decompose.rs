// Copyright 2024-2025 Irreducible Inc.

//! Partitioning of a constraint model into clusters of mutually dependent signals.
//!
//! The decomposer builds a directed graph over the unknown signals (outputs and intermediates).
//! A constraint that assigns `t` with `<==` contributes an edge `s -> t` for every other unknown
//! `s` it mentions. Any other constraint couples all of its unknowns with each other. The
//! strongly connected components of this graph are the clusters, and the condensation is
//! levelled so that every cluster comes after all clusters it depends on.

use std::ops::Range;

use itertools::Itertools;
use safecirc_utils::graph::condense;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::constraint_system::{ConstraintId, ConstraintModel, DependencyGraph, SignalId};

/// How the unknown signals of a model are grouped into clusters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecompositionStrategy {
	/// One cluster per strongly connected component of the dependency relation.
	#[default]
	Modular,
	/// A single cluster holding every unknown signal, with every constraint in its closure.
	Monolithic,
}

/// A group of signals that are verified together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
	/// Position of the cluster in the decomposition order.
	pub index: usize,
	/// Length of the longest dependency chain leading to this cluster.
	pub level: usize,
	/// Target signals, in increasing order.
	pub signals: Vec<SignalId>,
	/// Constraints touching any of the signals, in increasing order.
	pub closure: Vec<ConstraintId>,
}

impl Cluster {
	/// A cluster whose signals occur in no constraint.
	pub fn is_free(&self) -> bool {
		self.closure.is_empty()
	}
}

/// An ordered sequence of clusters covering every unknown signal exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
	strategy: DecompositionStrategy,
	clusters: Vec<Cluster>,
	/// Range of cluster indices for each level.
	levels: Vec<Range<usize>>,
}

impl Decomposition {
	#[instrument("Decomposition::new", skip_all, level = "debug")]
	pub fn new(
		model: &ConstraintModel,
		graph: &DependencyGraph,
		strategy: DecompositionStrategy,
	) -> Self {
		let unknowns = model
			.signals()
			.filter(|(_, signal)| !signal.role.is_parameter())
			.map(|(id, _)| id)
			.collect::<Vec<_>>();

		let mut clusters = match strategy {
			DecompositionStrategy::Modular => Self::modular_clusters(model, graph, &unknowns),
			DecompositionStrategy::Monolithic if unknowns.is_empty() => Vec::new(),
			DecompositionStrategy::Monolithic => vec![Cluster {
				index: 0,
				level: 0,
				closure: graph.closure(unknowns.iter().copied()),
				signals: unknowns,
			}],
		};

		clusters.sort_by_key(|cluster| (cluster.level, cluster.signals[0]));
		let mut levels: Vec<Range<usize>> = Vec::new();
		for (index, cluster) in clusters.iter_mut().enumerate() {
			cluster.index = index;
			while levels.len() <= cluster.level {
				levels.push(index..index);
			}
			levels[cluster.level].end = index + 1;
		}

		Self {
			strategy,
			clusters,
			levels,
		}
	}

	fn modular_clusters(
		model: &ConstraintModel,
		graph: &DependencyGraph,
		unknowns: &[SignalId],
	) -> Vec<Cluster> {
		// Dense node index of each unknown signal.
		let mut node_of = vec![usize::MAX; model.n_signals()];
		for (node, signal) in unknowns.iter().enumerate() {
			node_of[signal.index()] = node;
		}

		let mut adjacency = vec![Vec::new(); unknowns.len()];
		for (id, constraint) in model.constraints() {
			let nodes = graph
				.signals_of(id)
				.iter()
				.map(|signal| node_of[signal.index()])
				.filter(|&node| node != usize::MAX)
				.collect::<Vec<_>>();
			let assigned = constraint
				.assigns()
				.map(|signal| node_of[signal.index()])
				.filter(|&node| node != usize::MAX);
			match assigned {
				Some(target) => {
					for &node in &nodes {
						if node != target {
							adjacency[node].push(target);
						}
					}
				}
				None if nodes.len() > 1 => {
					for (&node, &next) in nodes.iter().circular_tuple_windows() {
						adjacency[node].push(next);
					}
				}
				None => {}
			}
		}

		let condensation = condense(&adjacency);
		condensation
			.components
			.iter()
			.zip(&condensation.levels)
			.map(|(nodes, &level)| {
				let signals = nodes.iter().map(|&node| unknowns[node]).collect::<Vec<_>>();
				Cluster {
					index: 0,
					level,
					closure: graph.closure(signals.iter().copied()),
					signals,
				}
			})
			.collect()
	}

	pub const fn strategy(&self) -> DecompositionStrategy {
		self.strategy
	}

	pub fn clusters(&self) -> &[Cluster] {
		&self.clusters
	}

	pub fn n_levels(&self) -> usize {
		self.levels.len()
	}

	/// Clusters grouped by level. Clusters of one level do not depend on each other.
	pub fn levels(&self) -> impl Iterator<Item = &[Cluster]> + '_ {
		self.levels
			.iter()
			.map(|range| &self.clusters[range.clone()])
	}

	/// Number of target signals, which equals the number of unknown signals of the model.
	pub fn n_targets(&self) -> usize {
		self.clusters
			.iter()
			.map(|cluster| cluster.signals.len())
			.sum()
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use super::*;

	fn decompose(model: &ConstraintModel, strategy: DecompositionStrategy) -> Decomposition {
		Decomposition::new(model, &DependencyGraph::new(model), strategy)
	}

	#[test]
	fn test_chain_is_levelled() {
		let mut model = ConstraintModel::default();
		let x = model.add_input("x");
		let a = model.add_intermediate("a");
		let b = model.add_intermediate("b");
		let y = model.add_output("y");
		// Declared out of order on purpose.
		model.assign(y, b + 1).unwrap();
		model.assign(b, a * a).unwrap();
		model.assign(a, x * 2).unwrap();

		let decomposition = decompose(&model, DecompositionStrategy::Modular);
		let order = decomposition
			.clusters()
			.iter()
			.map(|cluster| cluster.signals.clone())
			.collect::<Vec<_>>();
		assert_eq!(order, vec![vec![a], vec![b], vec![y]]);
		assert_eq!(decomposition.n_levels(), 3);
		assert_eq!(decomposition.clusters()[1].closure.len(), 2);
	}

	#[test]
	fn test_coupled_constraints_form_one_cluster() {
		let mut model = ConstraintModel::default();
		let x = model.add_input("x");
		let a = model.add_output("a");
		let b = model.add_output("b");
		let c = model.add_output("c");
		model.constrain(a + b - x).unwrap();
		model.constrain(a - b).unwrap();
		model.assign(c, a * b).unwrap();

		let decomposition = decompose(&model, DecompositionStrategy::Modular);
		assert_eq!(decomposition.clusters().len(), 2);
		assert_eq!(decomposition.clusters()[0].signals, vec![a, b]);
		assert_eq!(decomposition.clusters()[1].signals, vec![c]);
		assert_eq!(decomposition.clusters()[1].level, 1);
	}

	#[test]
	fn test_independent_clusters_share_a_level() {
		let mut model = ConstraintModel::default();
		let x = model.add_input("x");
		let p = model.add_output("p");
		let q = model.add_output("q");
		let free = model.add_output("free");
		model.assign(p, x + 1).unwrap();
		model.assign(q, x * x).unwrap();

		let decomposition = decompose(&model, DecompositionStrategy::Modular);
		assert_eq!(decomposition.n_levels(), 1);
		let level = decomposition.levels().next().unwrap();
		assert_eq!(level.len(), 3);
		let free_cluster = level.iter().find(|cluster| cluster.signals == [free]).unwrap();
		assert!(free_cluster.is_free());
	}

	#[test]
	fn test_every_unknown_is_covered_once() {
		let mut model = ConstraintModel::default();
		let x = model.add_input("x");
		let k = model.add_fixed("k");
		let signals = (0..6)
			.map(|i| model.add_intermediate(format!("s{i}")))
			.collect::<Vec<_>>();
		model.assign(signals[0], x * k).unwrap();
		model.constrain(signals[1] * signals[2] - signals[0]).unwrap();
		model.assign(signals[3], signals[2] + 7).unwrap();
		model.constrain(signals[4] - signals[3] * signals[1]).unwrap();

		for strategy in [DecompositionStrategy::Modular, DecompositionStrategy::Monolithic] {
			let decomposition = decompose(&model, strategy);
			let covered = decomposition
				.clusters()
				.iter()
				.flat_map(|cluster| cluster.signals.iter().copied())
				.collect::<BTreeSet<_>>();
			assert_eq!(covered.len(), decomposition.n_targets());
			assert_eq!(covered, signals.iter().copied().collect());
			for (index, cluster) in decomposition.clusters().iter().enumerate() {
				assert_eq!(cluster.index, index);
			}
		}

		let monolithic = decompose(&model, DecompositionStrategy::Monolithic);
		assert_eq!(monolithic.clusters().len(), 1);
		assert_eq!(monolithic.clusters()[0].closure.len(), model.n_constraints());
	}
}
