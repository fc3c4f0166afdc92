// Copyright 2024-2025 Irreducible Inc.

use std::cmp::Ordering;

const UNVISITED: usize = usize::MAX;

/// The condensation of a directed graph into its strongly connected components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condensation {
	/// Components in topological order (every edge goes from a lower to a higher index).
	/// The nodes of each component are sorted ascending.
	pub components: Vec<Vec<usize>>,
	/// For each node, the index of its component.
	pub component_of: Vec<usize>,
	/// Sorted, deduplicated successor components of each component.
	pub successors: Vec<Vec<usize>>,
	/// Length of the longest path reaching each component from a source component.
	pub levels: Vec<usize>,
}

impl Condensation {
	/// Number of distinct levels, that is one more than the largest level.
	pub fn n_levels(&self) -> usize {
		self.levels.iter().max().map_or(0, |&max| max + 1)
	}

	/// Groups component indices by level. Components sharing a level have no path between them.
	pub fn components_by_level(&self) -> Vec<Vec<usize>> {
		let mut by_level = vec![Vec::new(); self.n_levels()];
		for (component, &level) in self.levels.iter().enumerate() {
			by_level[level].push(component);
		}
		by_level
	}
}

/// Computes the strongly connected components of a directed graph given as adjacency lists over
/// node indices `0..adjacency.len()`, using an iterative Tarjan traversal.
///
/// ```
/// use safecirc_utils::graph::condense;
/// // 0 -> 1 -> 2 -> 1, 3 isolated
/// let c = condense(&[vec![1], vec![2], vec![1], vec![]]);
/// assert_eq!(c.components.len(), 3);
/// assert_eq!(c.component_of[1], c.component_of[2]);
/// assert!(c.component_of[0] < c.component_of[1]);
/// ```
///
/// ## Preconditions
///
/// * every successor index is smaller than `adjacency.len()`
pub fn condense<T: AsRef<[usize]>>(adjacency: &[T]) -> Condensation {
	let n = adjacency.len();
	let mut index = vec![UNVISITED; n];
	let mut lowlink = vec![0; n];
	let mut on_stack = vec![false; n];
	let mut stack = Vec::new();
	let mut next_index = 0;
	let mut components = Vec::new();

	// Explicit call stack of (node, position of the next edge to explore).
	let mut call_stack: Vec<(usize, usize)> = Vec::new();

	for root in 0..n {
		if index[root] != UNVISITED {
			continue;
		}

		index[root] = next_index;
		lowlink[root] = next_index;
		next_index += 1;
		stack.push(root);
		on_stack[root] = true;
		call_stack.push((root, 0));

		while let Some(frame) = call_stack.last_mut() {
			let v = frame.0;
			if let Some(&w) = adjacency[v].as_ref().get(frame.1) {
				frame.1 += 1;
				if index[w] == UNVISITED {
					index[w] = next_index;
					lowlink[w] = next_index;
					next_index += 1;
					stack.push(w);
					on_stack[w] = true;
					call_stack.push((w, 0));
				} else if on_stack[w] {
					lowlink[v] = lowlink[v].min(index[w]);
				}
				continue;
			}

			call_stack.pop();
			if let Some(&(parent, _)) = call_stack.last() {
				lowlink[parent] = lowlink[parent].min(lowlink[v]);
			}

			if lowlink[v] == index[v] {
				let mut component = Vec::new();
				while let Some(w) = stack.pop() {
					on_stack[w] = false;
					component.push(w);
					if w == v {
						break;
					}
				}
				component.sort_unstable();
				components.push(component);
			}
		}
	}

	// Tarjan emits a component only after everything reachable from it.
	components.reverse();

	let mut component_of = vec![0; n];
	for (c, nodes) in components.iter().enumerate() {
		for &node in nodes {
			component_of[node] = c;
		}
	}

	let mut successors = vec![Vec::new(); components.len()];
	for (v, edges) in adjacency.iter().enumerate() {
		let from = component_of[v];
		for &w in edges.as_ref() {
			let to = component_of[w];
			if to != from {
				successors[from].push(to);
			}
		}
	}
	for succ in &mut successors {
		succ.sort_unstable();
		succ.dedup();
	}

	let mut levels = vec![0; components.len()];
	for c in 0..components.len() {
		for &succ in &successors[c] {
			debug_assert!(succ > c);
			levels[succ] = levels[succ].max(levels[c] + 1);
		}
	}

	Condensation {
		components,
		component_of,
		successors,
		levels,
	}
}

/// Groups nodes `0..n` into connected components, where each group in `groups` connects all
/// of its nodes to one another.
///
/// Returns, for each node, the smallest node of its component.
///
/// ```
/// use safecirc_utils::graph::connected_components;
/// assert_eq!(connected_components::<Vec<usize>>(3, &[]), vec![0, 1, 2]);
/// assert_eq!(connected_components(5, &[vec![3, 1], vec![1, 2]]), vec![0, 1, 1, 1, 4]);
/// ```
///
/// ## Preconditions
///
/// * every node of every group is smaller than `n`
pub fn connected_components<T: AsRef<[usize]>>(n: usize, groups: &[T]) -> Vec<usize> {
	let mut uf = UnionFind::new(n);
	for group in groups {
		if let Some((&first, rest)) = group.as_ref().split_first() {
			for &node in rest {
				uf.union(first, node);
			}
		}
	}
	(0..n)
		.map(|node| {
			let root = uf.find(node);
			uf.min_element[root]
		})
		.collect()
}

#[derive(Debug)]
struct UnionFind {
	parent: Vec<usize>,
	rank: Vec<u32>,
	/// Smallest node of the set, valid at roots.
	min_element: Vec<usize>,
}

impl UnionFind {
	fn new(n: usize) -> Self {
		Self {
			parent: (0..n).collect(),
			rank: vec![0; n],
			min_element: (0..n).collect(),
		}
	}

	fn find(&mut self, mut x: usize) -> usize {
		while self.parent[x] != x {
			// Path halving.
			self.parent[x] = self.parent[self.parent[x]];
			x = self.parent[x];
		}
		x
	}

	fn union(&mut self, x: usize, y: usize) {
		let (rx, ry) = (self.find(x), self.find(y));
		if rx == ry {
			return;
		}
		let min_element = self.min_element[rx].min(self.min_element[ry]);
		let root = match self.rank[rx].cmp(&self.rank[ry]) {
			Ordering::Less => {
				self.parent[rx] = ry;
				ry
			}
			Ordering::Greater => {
				self.parent[ry] = rx;
				rx
			}
			Ordering::Equal => {
				self.parent[ry] = rx;
				self.rank[rx] += 1;
				rx
			}
		};
		self.min_element[root] = min_element;
	}
}
