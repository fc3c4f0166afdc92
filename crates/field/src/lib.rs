// Copyright 2023-2025 Irreducible Inc.

//! Prime field arithmetic for constraint systems over a runtime-chosen prime.
//!
//! Circuits emitted by Circom-style compilers live over a large prime field (by default the
//! BN254 scalar field). Elements are stored as canonical residues in `[0, p)` and all arithmetic
//! goes through a [`PrimeField`] context that owns the modulus.

pub mod error;
mod prime_field;

pub use error::*;
pub use prime_field::*;
