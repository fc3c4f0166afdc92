// Copyright 2023-2025 Irreducible Inc.

use num_bigint::BigUint;

/// Error thrown when a field operation fails.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
	#[error("the modulus {modulus} is smaller than 2")]
	ModulusTooSmall { modulus: BigUint },
	#[error("the modulus {modulus} is not prime")]
	NotPrime { modulus: BigUint },
	#[error("cannot parse '{literal}' as a field element")]
	InvalidLiteral { literal: String },
	#[error("division by zero")]
	DivisionByZero,
}
