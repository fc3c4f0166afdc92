// Copyright 2024-2025 Irreducible Inc.

use std::ops::{Index, IndexMut};

use safecirc_field::{Fp, PrimeField};
use safecirc_utils::bail;

use super::error::Error;

/// A dense row-major matrix over a prime field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
	m: usize,
	n: usize,
	elements: Vec<Fp>,
}

impl Matrix {
	pub fn new(m: usize, n: usize, elements: Vec<Fp>) -> Result<Self, Error> {
		if elements.len() != m * n {
			bail!(Error::IncorrectArgumentLength {
				arg: "elements".into(),
				expected: m * n,
			});
		}
		Ok(Self { m, n, elements })
	}

	pub fn zeros(m: usize, n: usize) -> Self {
		Self {
			m,
			n,
			elements: vec![Fp::zero(); m * n],
		}
	}

	pub const fn m(&self) -> usize {
		self.m
	}

	pub const fn n(&self) -> usize {
		self.n
	}

	pub const fn dim(&self) -> (usize, usize) {
		(self.m, self.n)
	}

	pub fn elements(&self) -> &[Fp] {
		&self.elements
	}

	pub fn row(&self, i: usize) -> &[Fp] {
		assert!(i < self.m);
		&self.elements[i * self.n..(i + 1) * self.n]
	}

	fn row_mut(&mut self, i: usize) -> &mut [Fp] {
		assert!(i < self.m);
		&mut self.elements[i * self.n..(i + 1) * self.n]
	}

	/// Brings the matrix to reduced row echelon form, choosing pivots only among the first
	/// `pivot_cols` columns. The remaining columns are carried along as right-hand sides.
	///
	/// Returns the pivot column of each non-zero leading row; rows past the returned length have
	/// zeros in all pivot-eligible columns.
	pub fn row_reduce(&mut self, field: &PrimeField, pivot_cols: usize) -> Vec<usize> {
		assert!(pivot_cols <= self.n);

		let mut pivots = Vec::new();
		for col in 0..pivot_cols {
			let row = pivots.len();
			if row == self.m {
				break;
			}

			// Find the pivot row
			let Some(pivot) = (row..self.m).find(|&i| !self[(i, col)].is_zero()) else {
				continue;
			};
			self.swap_rows(row, pivot);

			// Normalize the pivot
			let Some(scalar) = field.inverse(&self[(row, col)]) else {
				unreachable!("pivot is checked to be non-zero above");
			};
			self.scale_row(field, row, &scalar);

			// Clear the pivot column
			for i in (0..row).chain(row + 1..self.m) {
				let scalar = self[(i, col)].clone();
				if !scalar.is_zero() {
					self.sub_pivot_row(field, i, row, &scalar);
				}
			}
			pivots.push(col);
		}
		pivots
	}

	fn swap_rows(&mut self, i0: usize, i1: usize) {
		assert!(i0 < self.m);
		assert!(i1 < self.m);

		if i0 == i1 {
			return;
		}
		for j in 0..self.n {
			self.elements.swap(i0 * self.n + j, i1 * self.n + j);
		}
	}

	fn scale_row(&mut self, field: &PrimeField, i: usize, scalar: &Fp) {
		for x in self.row_mut(i) {
			*x = field.mul(x, scalar);
		}
	}

	fn sub_pivot_row(&mut self, field: &PrimeField, i0: usize, i1: usize, scalar: &Fp) {
		assert!(i0 < self.m);
		assert!(i1 < self.m);

		for j in 0..self.n {
			let x = field.mul(&self[(i1, j)], scalar);
			self[(i0, j)] = field.sub(&self[(i0, j)], &x);
		}
	}
}

impl Index<(usize, usize)> for Matrix {
	type Output = Fp;

	fn index(&self, index: (usize, usize)) -> &Self::Output {
		let (i, j) = index;
		assert!(i < self.m);
		assert!(j < self.n);
		&self.elements[i * self.n + j]
	}
}

impl IndexMut<(usize, usize)> for Matrix {
	fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
		let (i, j) = index;
		assert!(i < self.m);
		assert!(j < self.n);
		&mut self.elements[i * self.n + j]
	}
}
