// Copyright 2024-2025 Irreducible Inc.

//! Polynomial algebra over prime fields, built atop the `safecirc_field` crate.
//!
//! This crate provides the algebraic machinery used by the circuit verifier, including:
//!
//! * Sparse polynomials over arbitrary variable identifiers
//! * Dense multivariate polynomial rings with lex and grevlex orders
//! * Gröbner bases computed by Buchberger's algorithm under a resource budget
//! * Univariate polynomials and root finding
//! * Matrix row reduction

mod budget;
mod error;
mod groebner;
mod matrix;
mod monomial;
mod polynomial;
mod sparse;
mod univariate;

pub use budget::*;
pub use error::*;
pub use groebner::*;
pub use matrix::*;
pub use monomial::*;
pub use polynomial::*;
pub use sparse::*;
pub use univariate::*;
